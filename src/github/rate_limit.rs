//! Retry hints from GitHub rate-limit responses.
//!
//! GitHub signals secondary limits with `Retry-After` and primary limits with
//! `X-RateLimit-Remaining: 0` plus `X-RateLimit-Reset` (a Unix timestamp).

use chrono::{DateTime, Utc};
use http::header::RETRY_AFTER;
use http::HeaderMap;

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Seconds the caller should wait before retrying, if the headers say.
pub(crate) fn retry_after_hint(headers: &HeaderMap, now: DateTime<Utc>) -> Option<u64> {
    if let Some(seconds) = header_number::<u64>(headers, RETRY_AFTER.as_str()) {
        return Some(seconds);
    }

    let remaining = header_number::<u64>(headers, RATE_LIMIT_REMAINING)?;
    if remaining > 0 {
        return None;
    }

    let reset_at = header_number::<i64>(headers, RATE_LIMIT_RESET)?;
    Some(u64::try_from(reset_at.saturating_sub(now.timestamp())).unwrap_or(0))
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
