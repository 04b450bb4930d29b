//! Failures surfaced by a single GitHub API call.

use thiserror::Error;

/// Error returned by one request against the GitHub API.
///
/// Every variant is terminal for the request that produced it. The gateway
/// never retries; callers decide what to do with the hint fields.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// GitHub answered 404 for the requested resource.
    #[error("resource not found on GitHub")]
    NotFound,

    /// GitHub refused the request because the rate limit is exhausted.
    #[error("GitHub API rate limit exceeded")]
    RateLimited {
        /// Seconds to wait before retrying, when GitHub told us.
        retry_after_secs: Option<u64>,
    },

    /// The request did not complete within the configured timeout.
    #[error("request to GitHub API timed out")]
    Timeout,

    /// The response body could not be decoded into the expected shape.
    #[error("malformed GitHub response: {message}")]
    Malformed {
        /// Decoder detail.
        message: String,
    },

    /// GitHub could not be reached or answered with a server-side failure.
    #[error("failed to reach GitHub API: {message}")]
    Unreachable {
        /// Transport or status detail.
        message: String,
    },
}

impl FetchError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub(crate) fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }
}
