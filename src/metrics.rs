use crate::github::{IssueLikeItem, ItemKind, ItemState, RepositorySummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running issue and pull request totals for one collection run.
///
/// Counters only ever grow. Merging is a commutative, associative fold, so
/// the order pages arrive in does not matter, but each page must be merged
/// exactly once: nothing here detects a page seen twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccumulatedMetrics {
    pub issues_open: u64,
    pub issues_closed: u64,
    pub prs_open: u64,
    pub prs_closed: u64,
}

impl AccumulatedMetrics {
    /// Folds one page of items into the running totals.
    #[must_use]
    pub fn merge(mut self, page: &[IssueLikeItem]) -> Self {
        for item in page {
            self.record(*item);
        }
        self
    }

    fn record(&mut self, item: IssueLikeItem) {
        let counter = match (item.kind, item.state) {
            (ItemKind::Issue, ItemState::Open) => &mut self.issues_open,
            (ItemKind::Issue, ItemState::Closed) => &mut self.issues_closed,
            (ItemKind::PullRequest, ItemState::Open) => &mut self.prs_open,
            (ItemKind::PullRequest, ItemState::Closed) => &mut self.prs_closed,
        };
        *counter += 1;
    }

    #[must_use]
    pub const fn total_issues(&self) -> u64 {
        self.issues_open + self.issues_closed
    }

    #[must_use]
    pub const fn total_prs(&self) -> u64 {
        self.prs_open + self.prs_closed
    }
}

/// The result of one successful collection run, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub owner: String,
    pub repo: String,
    pub stars: u64,
    /// Open issues only; pull requests are excluded.
    pub issues: u64,
    pub language: Option<String>,
    #[serde(flatten)]
    pub breakdown: AccumulatedMetrics,
    /// When the run completed.
    pub timestamp: DateTime<Utc>,
}

impl MetricsRecord {
    /// Combines the summary and the accumulated totals of a finished run.
    #[must_use]
    pub fn assemble(
        summary: RepositorySummary,
        breakdown: AccumulatedMetrics,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner: summary.identity.owner,
            repo: summary.identity.name,
            stars: summary.stars,
            issues: breakdown.issues_open,
            language: summary.language,
            breakdown,
            timestamp: completed_at,
        }
    }
}

/// The public response structure for the detailed repository view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailedMetrics {
    pub owner: String,
    pub repo: String,
    pub stars: u64,
    pub language: Option<String>,
    pub issues_open: u64,
    pub issues_closed: u64,
    pub prs_open: u64,
    pub prs_closed: u64,
    pub total_issues: u64,
    pub total_prs: u64,
}

impl From<&MetricsRecord> for DetailedMetrics {
    fn from(record: &MetricsRecord) -> Self {
        let breakdown = record.breakdown;
        Self {
            owner: record.owner.clone(),
            repo: record.repo.clone(),
            stars: record.stars,
            language: record.language.clone(),
            issues_open: breakdown.issues_open,
            issues_closed: breakdown.issues_closed,
            prs_open: breakdown.prs_open,
            prs_closed: breakdown.prs_closed,
            total_issues: breakdown.total_issues(),
            total_prs: breakdown.total_prs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::RepositoryIdentity;
    use chrono::TimeZone;

    const ISSUE_OPEN: IssueLikeItem = IssueLikeItem::new(ItemKind::Issue, ItemState::Open);
    const ISSUE_CLOSED: IssueLikeItem = IssueLikeItem::new(ItemKind::Issue, ItemState::Closed);
    const PR_OPEN: IssueLikeItem = IssueLikeItem::new(ItemKind::PullRequest, ItemState::Open);
    const PR_CLOSED: IssueLikeItem = IssueLikeItem::new(ItemKind::PullRequest, ItemState::Closed);

    fn fold(pages: &[Vec<IssueLikeItem>]) -> AccumulatedMetrics {
        pages
            .iter()
            .fold(AccumulatedMetrics::default(), |running, page| running.merge(page))
    }

    /// Every ordering of `items`, via Heap's algorithm.
    fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
        fn heap<T: Clone>(k: usize, items: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
            if k <= 1 {
                out.push(items.clone());
                return;
            }
            for i in 0..k - 1 {
                heap(k - 1, items, out);
                if k % 2 == 0 {
                    items.swap(i, k - 1);
                } else {
                    items.swap(0, k - 1);
                }
            }
            heap(k - 1, items, out);
        }

        let mut scratch = items.to_vec();
        let mut out = Vec::new();
        heap(scratch.len(), &mut scratch, &mut out);
        out
    }

    #[test]
    fn test_merge_empty_page_is_identity() {
        let running = AccumulatedMetrics {
            issues_open: 3,
            ..AccumulatedMetrics::default()
        };

        assert_eq!(running.merge(&[]), running);
    }

    #[test]
    fn test_merge_classifies_each_item_into_one_counter() {
        let metrics = AccumulatedMetrics::default().merge(&[
            ISSUE_OPEN,
            ISSUE_OPEN,
            ISSUE_CLOSED,
            PR_OPEN,
            PR_CLOSED,
            PR_CLOSED,
            PR_CLOSED,
        ]);

        assert_eq!(
            metrics,
            AccumulatedMetrics {
                issues_open: 2,
                issues_closed: 1,
                prs_open: 1,
                prs_closed: 3,
            }
        );
        assert_eq!(metrics.total_issues(), 3);
        assert_eq!(metrics.total_prs(), 4);
    }

    #[test]
    fn test_pull_requests_never_touch_issue_counters() {
        let metrics = AccumulatedMetrics::default().merge(&[PR_OPEN, PR_CLOSED, PR_OPEN]);

        assert_eq!(metrics.issues_open, 0);
        assert_eq!(metrics.issues_closed, 0);
        assert_eq!(metrics.total_prs(), 3);
    }

    #[test]
    fn test_issues_never_touch_pull_request_counters() {
        let metrics = AccumulatedMetrics::default().merge(&[ISSUE_CLOSED, ISSUE_OPEN]);

        assert_eq!(metrics.prs_open, 0);
        assert_eq!(metrics.prs_closed, 0);
        assert_eq!(metrics.total_issues(), 2);
    }

    #[test]
    fn test_merge_is_order_independent_across_pages() {
        let pages = vec![
            vec![ISSUE_OPEN, PR_OPEN],
            vec![ISSUE_CLOSED],
            vec![PR_CLOSED, PR_CLOSED, ISSUE_OPEN],
            vec![],
            vec![PR_OPEN, ISSUE_CLOSED, ISSUE_CLOSED],
        ];
        let expected = fold(&pages);

        let orderings = permutations(&pages);
        assert_eq!(orderings.len(), 120);
        for ordering in orderings {
            assert_eq!(fold(&ordering), expected, "ordering {ordering:?}");
        }
    }

    #[test]
    fn test_merge_is_order_independent_within_a_page() {
        let items = [ISSUE_OPEN, ISSUE_CLOSED, PR_OPEN, PR_CLOSED, ISSUE_OPEN, PR_OPEN];
        let expected = AccumulatedMetrics::default().merge(&items);

        for ordering in permutations(&items) {
            assert_eq!(AccumulatedMetrics::default().merge(&ordering), expected);
        }
    }

    #[test]
    fn test_record_takes_open_issue_count_as_issues() {
        let summary = RepositorySummary {
            identity: RepositoryIdentity::parse("acme", "widgets").unwrap(),
            stars: 42,
            language: Some("Go".to_owned()),
            open_issues_count: 9,
        };
        let breakdown = AccumulatedMetrics {
            issues_open: 1,
            issues_closed: 1,
            prs_open: 1,
            prs_closed: 1,
        };
        let completed_at = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();

        let record = MetricsRecord::assemble(summary, breakdown, completed_at);

        assert_eq!(record.owner, "acme");
        assert_eq!(record.repo, "widgets");
        assert_eq!(record.stars, 42);
        assert_eq!(record.issues, 1);
        assert_eq!(record.language.as_deref(), Some("Go"));
        assert_eq!(record.timestamp, completed_at);

        let detailed = DetailedMetrics::from(&record);
        assert_eq!(detailed.total_issues, 2);
        assert_eq!(detailed.total_prs, 2);
    }

    #[test]
    fn test_record_serializes_flat_breakdown() {
        let record = MetricsRecord {
            owner: "acme".to_owned(),
            repo: "widgets".to_owned(),
            stars: 42,
            issues: 1,
            language: None,
            breakdown: AccumulatedMetrics {
                issues_open: 1,
                issues_closed: 2,
                prs_open: 3,
                prs_closed: 4,
            },
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };

        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["issues"], 1);
        assert_eq!(json["issues_closed"], 2);
        assert_eq!(json["prs_closed"], 4);
        assert_eq!(json["language"], serde_json::Value::Null);
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00Z");
    }
}
