//! SQLite-backed store of collected repository records.
//!
//! One row per repository. Owner and repo are stored lower-cased so lookups
//! are case-insensitive; a repeated collection updates the existing row.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use thiserror::Error;

use crate::github::OwnerRepository;
use crate::metrics::{AccumulatedMetrics, MetricsRecord};

/// Largest `limit` accepted by [`RecordFilter`].
pub const MAX_LIST_LIMIT: u32 = 1000;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    repo TEXT NOT NULL,
    stars INTEGER NOT NULL DEFAULT 0,
    issues INTEGER NOT NULL DEFAULT 0,
    language TEXT,
    issues_open INTEGER NOT NULL DEFAULT 0,
    issues_closed INTEGER NOT NULL DEFAULT 0,
    prs_open INTEGER NOT NULL DEFAULT 0,
    prs_closed INTEGER NOT NULL DEFAULT 0,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_repositories_owner ON repositories(owner);
CREATE INDEX IF NOT EXISTS idx_repositories_owner_repo ON repositories(owner, repo);
";

/// Columns added after the first release; older databases gain them on open.
const BREAKDOWN_COLUMNS: &[&str] = &["issues_open", "issues_closed", "prs_open", "prs_closed"];

const SELECT_COLUMNS: &str = "id, owner, repo, stars, issues, language, \
     issues_open, issues_closed, prs_open, prs_closed, timestamp";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store connection lock was poisoned")]
    Poisoned,

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A persisted record with its row id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: MetricsRecord,
}

/// Result of an upsert: the row as stored and whether it was newly created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub stored: StoredRecord,
    pub created: bool,
}

/// Counts from storing an owner listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingOutcome {
    pub stored: usize,
    pub updated: usize,
}

/// Column filters for [`RecordStore::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Matched case-insensitively.
    pub owner: Option<String>,
    /// Matched exactly after trimming.
    pub language: Option<String>,
    pub limit: Option<u32>,
}

impl RecordFilter {
    /// Normalises blank filters away and lower-cases the owner.
    #[must_use]
    pub fn new(owner: Option<&str>, language: Option<&str>, limit: Option<u32>) -> Self {
        let clean = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
        };
        Self {
            owner: clean(owner).map(|owner| owner.to_lowercase()),
            language: clean(language),
            limit,
        }
    }
}

/// Keyed record store. Cloning shares the underlying connection.
#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl RecordStore {
    /// Opens (creating if needed) the database at `path` and brings its schema up to date.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened or the schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Fails when SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_connection<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            work(&mut guard)
        })
        .await?
    }

    /// Inserts the record, or overwrites the existing row for the same repository.
    ///
    /// # Errors
    ///
    /// Propagates SQLite failures; nothing is written when one occurs.
    pub async fn upsert(&self, record: MetricsRecord) -> Result<UpsertOutcome, StoreError> {
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let outcome = write_record(&tx, &record)?;
            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    /// Like [`RecordStore::upsert`], but leaves a row alone when its timestamp
    /// is later than the record's. Returns `None` when nothing was written.
    ///
    /// # Errors
    ///
    /// Propagates SQLite failures.
    pub async fn upsert_unless_superseded(
        &self,
        record: MetricsRecord,
    ) -> Result<Option<UpsertOutcome>, StoreError> {
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let stored_at: Option<DateTime<Utc>> = tx
                .query_row(
                    "SELECT timestamp FROM repositories WHERE owner = ?1 AND repo = ?2 \
                     ORDER BY id LIMIT 1",
                    params![record.owner.to_lowercase(), record.repo.to_lowercase()],
                    |row| row.get(0),
                )
                .optional()?;
            if stored_at.is_some_and(|stored_at| stored_at > record.timestamp) {
                return Ok(None);
            }

            let outcome = write_record(&tx, &record)?;
            tx.commit()?;
            Ok(Some(outcome))
        })
        .await
    }

    /// Stores the summary fields of an owner listing in one transaction.
    ///
    /// Existing rows keep their issue/pull request breakdown; only stars,
    /// open issues and language are refreshed.
    ///
    /// # Errors
    ///
    /// Propagates SQLite failures; the whole listing is rolled back.
    pub async fn upsert_listing(
        &self,
        owner: &str,
        repositories: Vec<OwnerRepository>,
        observed_at: DateTime<Utc>,
    ) -> Result<ListingOutcome, StoreError> {
        let owner = owner.to_lowercase();
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let mut outcome = ListingOutcome::default();

            for repository in &repositories {
                let repo = repository.name.to_lowercase();
                match find_id(&tx, &owner, &repo)? {
                    Some(id) => {
                        tx.execute(
                            "UPDATE repositories SET stars = ?1, issues = ?2, language = ?3, \
                             timestamp = ?4 WHERE id = ?5",
                            params![
                                repository.stars,
                                repository.open_issues,
                                repository.language,
                                observed_at,
                                id
                            ],
                        )?;
                        outcome.updated += 1;
                    }
                    None => {
                        tx.execute(
                            "INSERT INTO repositories (owner, repo, stars, issues, language, timestamp) \
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                            params![
                                owner,
                                repo,
                                repository.stars,
                                repository.open_issues,
                                repository.language,
                                observed_at
                            ],
                        )?;
                        outcome.stored += 1;
                    }
                }
            }

            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    /// Lists stored records matching `filter`, oldest row first.
    ///
    /// # Errors
    ///
    /// Propagates SQLite failures.
    pub async fn list(&self, filter: RecordFilter) -> Result<Vec<StoredRecord>, StoreError> {
        self.with_connection(move |conn| {
            let mut sql = format!("SELECT {SELECT_COLUMNS} FROM repositories");
            let mut clauses = Vec::new();
            let mut values = Vec::new();

            if let Some(owner) = filter.owner {
                values.push(Value::Text(owner));
                clauses.push(format!("owner = ?{}", values.len()));
            }
            if let Some(language) = filter.language {
                values.push(Value::Text(language));
                clauses.push(format!("language = ?{}", values.len()));
            }
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY id");
            if let Some(limit) = filter.limit {
                values.push(Value::Integer(i64::from(limit)));
                sql.push_str(&format!(" LIMIT ?{}", values.len()));
            }

            let mut statement = conn.prepare(&sql)?;
            let records = statement
                .query_map(params_from_iter(values), stored_record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }
}

fn write_record(conn: &Connection, record: &MetricsRecord) -> rusqlite::Result<UpsertOutcome> {
    let owner = record.owner.to_lowercase();
    let repo = record.repo.to_lowercase();
    let breakdown = record.breakdown;

    let (id, created) = match find_id(conn, &owner, &repo)? {
        Some(id) => {
            conn.execute(
                "UPDATE repositories SET stars = ?1, issues = ?2, language = ?3, \
                 issues_open = ?4, issues_closed = ?5, prs_open = ?6, prs_closed = ?7, \
                 timestamp = ?8 WHERE id = ?9",
                params![
                    record.stars,
                    record.issues,
                    record.language,
                    breakdown.issues_open,
                    breakdown.issues_closed,
                    breakdown.prs_open,
                    breakdown.prs_closed,
                    record.timestamp,
                    id
                ],
            )?;
            (id, false)
        }
        None => {
            conn.execute(
                "INSERT INTO repositories (owner, repo, stars, issues, language, \
                 issues_open, issues_closed, prs_open, prs_closed, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    owner,
                    repo,
                    record.stars,
                    record.issues,
                    record.language,
                    breakdown.issues_open,
                    breakdown.issues_closed,
                    breakdown.prs_open,
                    breakdown.prs_closed,
                    record.timestamp
                ],
            )?;
            (conn.last_insert_rowid(), true)
        }
    };

    let stored = conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM repositories WHERE id = ?1"),
        params![id],
        stored_record_from_row,
    )?;
    Ok(UpsertOutcome { stored, created })
}

fn find_id(conn: &Connection, owner: &str, repo: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM repositories WHERE owner = ?1 AND repo = ?2 ORDER BY id LIMIT 1",
        params![owner, repo],
        |row| row.get(0),
    )
    .optional()
}

fn stored_record_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        id: row.get("id")?,
        record: MetricsRecord {
            owner: row.get("owner")?,
            repo: row.get("repo")?,
            stars: row.get("stars")?,
            issues: row.get("issues")?,
            language: row.get("language")?,
            breakdown: AccumulatedMetrics {
                issues_open: row.get("issues_open")?,
                issues_closed: row.get("issues_closed")?,
                prs_open: row.get("prs_open")?,
                prs_closed: row.get("prs_closed")?,
            },
            timestamp: row.get("timestamp")?,
        },
    })
}

fn column_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut statement = conn.prepare("PRAGMA table_info(repositories)")?;
    let names = statement
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect();
    names
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let existing = column_names(conn)?;
    for column in BREAKDOWN_COLUMNS {
        if existing.iter().any(|name| name == column) {
            continue;
        }
        conn.execute_batch(&format!(
            "ALTER TABLE repositories ADD COLUMN {column} INTEGER NOT NULL DEFAULT 0;"
        ))?;
        tracing::info!(column, "added missing column to repositories table");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(owner: &str, repo: &str, stars: u64, language: Option<&str>) -> MetricsRecord {
        MetricsRecord {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            stars,
            issues: 3,
            language: language.map(ToOwned::to_owned),
            breakdown: AccumulatedMetrics {
                issues_open: 3,
                issues_closed: 4,
                prs_open: 5,
                prs_closed: 6,
            },
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn upsert_inserts_then_updates_case_insensitively() {
        let store = RecordStore::open_in_memory().unwrap();

        let first = store
            .upsert(record("Facebook", "React", 100, Some("JavaScript")))
            .await
            .unwrap();
        assert!(first.created);
        assert_eq!(first.stored.record.owner, "facebook");
        assert_eq!(first.stored.record.repo, "react");
        assert_eq!(first.stored.record.breakdown.prs_closed, 6);

        let second = store
            .upsert(record("facebook", "REACT", 200, Some("TypeScript")))
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.stored.id, first.stored.id);
        assert_eq!(second.stored.record.stars, 200);
        assert_eq!(second.stored.record.language.as_deref(), Some("TypeScript"));

        let all = store.list(RecordFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_owner_language_and_limit() {
        let store = RecordStore::open_in_memory().unwrap();
        store.upsert(record("facebook", "react", 1, Some("JavaScript"))).await.unwrap();
        store.upsert(record("facebook", "jest", 2, Some("TypeScript"))).await.unwrap();
        store.upsert(record("vuejs", "vue", 3, Some("JavaScript"))).await.unwrap();
        store.upsert(record("acme", "mystery", 4, None)).await.unwrap();

        let by_owner = store
            .list(RecordFilter::new(Some(" FaceBook "), None, None))
            .await
            .unwrap();
        assert_eq!(by_owner.len(), 2);
        assert!(by_owner.iter().all(|stored| stored.record.owner == "facebook"));

        let by_language = store
            .list(RecordFilter::new(None, Some("JavaScript"), None))
            .await
            .unwrap();
        let repos: Vec<_> = by_language.iter().map(|s| s.record.repo.as_str()).collect();
        assert_eq!(repos, ["react", "vue"]);

        let both = store
            .list(RecordFilter::new(Some("facebook"), Some("JavaScript"), None))
            .await
            .unwrap();
        assert_eq!(both.len(), 1);

        let limited = store
            .list(RecordFilter::new(None, None, Some(3)))
            .await
            .unwrap();
        assert_eq!(limited.len(), 3);
    }

    #[tokio::test]
    async fn guarded_upsert_keeps_newer_row() {
        let store = RecordStore::open_in_memory().unwrap();
        let older = record("acme", "widgets", 1, Some("Go"));
        let mut newer = record("acme", "widgets", 99, Some("Go"));
        newer.timestamp = older.timestamp + chrono::Duration::hours(1);
        store.upsert(newer).await.unwrap();

        let skipped = store.upsert_unless_superseded(older.clone()).await.unwrap();
        assert!(skipped.is_none());
        let all = store.list(RecordFilter::default()).await.unwrap();
        assert_eq!(all[0].record.stars, 99);

        let mut latest = older;
        latest.stars = 120;
        latest.timestamp += chrono::Duration::hours(2);
        let written = store.upsert_unless_superseded(latest).await.unwrap().unwrap();
        assert!(!written.created);
        assert_eq!(written.stored.record.stars, 120);
    }

    #[tokio::test]
    async fn guarded_upsert_inserts_missing_row() {
        let store = RecordStore::open_in_memory().unwrap();

        let written = store
            .upsert_unless_superseded(record("acme", "gadgets", 5, None))
            .await
            .unwrap()
            .unwrap();

        assert!(written.created);
    }

    #[test]
    fn blank_filters_are_ignored() {
        let filter = RecordFilter::new(Some("  "), Some(""), None);

        assert_eq!(filter, RecordFilter::default());
    }

    #[tokio::test]
    async fn listing_upsert_counts_new_and_updated_rows() {
        let store = RecordStore::open_in_memory().unwrap();
        store.upsert(record("acme", "widgets", 1, Some("Go"))).await.unwrap();

        let listing = vec![
            OwnerRepository {
                name: "Widgets".to_owned(),
                full_name: "acme/Widgets".to_owned(),
                owner: "acme".to_owned(),
                description: None,
                stars: 50,
                forks: 0,
                open_issues: 7,
                language: Some("Go".to_owned()),
                is_private: false,
                is_fork: false,
                created_at: None,
                updated_at: None,
                pushed_at: None,
                url: None,
                api_url: None,
            },
            OwnerRepository {
                name: "gadgets".to_owned(),
                full_name: "acme/gadgets".to_owned(),
                owner: "acme".to_owned(),
                description: None,
                stars: 5,
                forks: 0,
                open_issues: 1,
                language: None,
                is_private: false,
                is_fork: false,
                created_at: None,
                updated_at: None,
                pushed_at: None,
                url: None,
                api_url: None,
            },
        ];
        let observed_at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let outcome = store.upsert_listing("ACME", listing, observed_at).await.unwrap();
        assert_eq!(outcome, ListingOutcome { stored: 1, updated: 1 });

        let rows = store
            .list(RecordFilter::new(Some("acme"), None, None))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        let widgets = &rows[0].record;
        assert_eq!(widgets.stars, 50);
        assert_eq!(widgets.issues, 7);
        assert_eq!(widgets.breakdown.prs_open, 5, "breakdown survives a listing refresh");
        assert_eq!(widgets.timestamp, observed_at);
        let gadgets = &rows[1].record;
        assert_eq!(gadgets.breakdown, AccumulatedMetrics::default());
    }

    #[tokio::test]
    async fn reopening_a_file_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.db");

        {
            let store = RecordStore::open(&path).unwrap();
            store.upsert(record("acme", "widgets", 9, None)).await.unwrap();
        }

        let store = RecordStore::open(&path).unwrap();
        let rows = store.list(RecordFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.stars, 9);
    }

    #[tokio::test]
    async fn opening_a_legacy_table_adds_breakdown_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE repositories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner TEXT NOT NULL,
                    repo TEXT NOT NULL,
                    stars INTEGER NOT NULL DEFAULT 0,
                    issues INTEGER NOT NULL DEFAULT 0,
                    language TEXT,
                    timestamp TEXT NOT NULL
                );
                INSERT INTO repositories (owner, repo, stars, issues, language, timestamp)
                VALUES ('acme', 'old', 11, 2, 'C', '2023-05-01 00:00:00');",
            )
            .unwrap();
        }

        let store = RecordStore::open(&path).unwrap();
        let rows = store.list(RecordFilter::default()).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.stars, 11);
        assert_eq!(rows[0].record.breakdown, AccumulatedMetrics::default());
    }
}
