use std::collections::BTreeMap;

use serde::Serialize;

use crate::store::StoredRecord;

/// Label used for repositories GitHub reports no language for.
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

/// Totals across a set of stored repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    pub total_stars: u64,
    /// Sum of open issue counts.
    pub total_issues: u64,
    pub repo_count: usize,
    /// Number of repositories per primary language.
    pub by_language: BTreeMap<String, usize>,
}

impl Aggregation {
    #[must_use]
    pub fn from_records(records: &[StoredRecord]) -> Self {
        records
            .iter()
            .fold(Self::default(), |mut aggregation, stored| {
                let record = &stored.record;
                aggregation.total_stars += record.stars;
                aggregation.total_issues += record.issues;
                aggregation.repo_count += 1;
                let language = record.language.as_deref().unwrap_or(UNKNOWN_LANGUAGE);
                *aggregation
                    .by_language
                    .entry(language.to_owned())
                    .or_default() += 1;
                aggregation
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{AccumulatedMetrics, MetricsRecord};
    use chrono::{TimeZone, Utc};

    fn stored(id: i64, owner: &str, stars: u64, issues: u64, language: Option<&str>) -> StoredRecord {
        StoredRecord {
            id,
            record: MetricsRecord {
                owner: owner.to_owned(),
                repo: format!("repo-{id}"),
                stars,
                issues,
                language: language.map(ToOwned::to_owned),
                breakdown: AccumulatedMetrics::default(),
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            },
        }
    }

    #[test]
    fn test_aggregate_empty() {
        let aggregation = Aggregation::from_records(&[]);

        assert_eq!(aggregation, Aggregation::default());
        let json = serde_json::to_value(&aggregation).unwrap();
        assert_eq!(json["by_language"], serde_json::json!({}));
    }

    #[test]
    fn test_aggregate_sums_and_groups() {
        let records = [
            stored(1, "facebook", 200_000, 500, Some("JavaScript")),
            stored(2, "facebook", 110_000, 300, Some("JavaScript")),
            stored(3, "microsoft", 150_000, 200, Some("TypeScript")),
            stored(4, "acme", 5, 1, None),
        ];

        let aggregation = Aggregation::from_records(&records);

        assert_eq!(aggregation.total_stars, 460_005);
        assert_eq!(aggregation.total_issues, 1001);
        assert_eq!(aggregation.repo_count, 4);
        assert_eq!(aggregation.by_language["JavaScript"], 2);
        assert_eq!(aggregation.by_language["TypeScript"], 1);
        assert_eq!(aggregation.by_language[UNKNOWN_LANGUAGE], 1);
    }
}
