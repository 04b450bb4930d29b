//! Service layer tying collection, storage and caching together.
//!
//! `MetricsQuerier` is what the HTTP handlers talk to. It handles:
//! 1. Running fresh collections and persisting their records.
//! 2. Serving the detailed view through a read-through cache.
//! 3. Listing an owner's repositories, optionally recording them.
//! 4. Reading stored records back, raw or aggregated.

use crate::aggregate::Aggregation;
use crate::collector::{CollectionError, Collector};
use crate::config::AppConfig;
use crate::github::{OwnerRepository, RepositoryIdentity};
use crate::metrics::MetricsRecord;
use crate::store::{RecordFilter, RecordStore, StoreError, StoredRecord, UpsertOutcome};
use chrono::Utc;
use moka::future::Cache;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An owner's repositories as GitHub reported them.
#[derive(Debug, Clone)]
pub struct OwnerListing {
    pub repositories: Vec<OwnerRepository>,
    /// Rows inserted and updated, when the listing was recorded.
    pub recorded: Option<(usize, usize)>,
}

#[derive(Clone)]
pub struct MetricsQuerier {
    collector: Collector,
    store: RecordStore,
    cache: Cache<(String, String), MetricsRecord>,
}

impl MetricsQuerier {
    pub fn new(collector: Collector, store: RecordStore, config: &AppConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_max_capacity)
            .time_to_live(config.cache_ttl())
            .build();

        Self {
            collector,
            store,
            cache,
        }
    }

    /// Runs a fresh collection and persists it, bypassing the cache.
    pub async fn fetch_and_store(
        &self,
        identity: &RepositoryIdentity,
    ) -> Result<UpsertOutcome, QueryError> {
        let record = self.collector.collect(identity).await?;
        self.cache
            .insert(identity.lookup_key(), record.clone())
            .await;

        let outcome = self.store.upsert(record).await?;
        tracing::info!(
            repository = %identity,
            id = outcome.stored.id,
            created = outcome.created,
            "stored repository metrics"
        );
        Ok(outcome)
    }

    /// Retrieves metrics for a repository, collecting them if not cached (read-through).
    ///
    /// Concurrent misses for the same repository share one collection run.
    /// With `store`, the record is persisted unless the stored row is newer.
    pub async fn details(
        &self,
        identity: &RepositoryIdentity,
        store: bool,
    ) -> Result<MetricsRecord, QueryError> {
        let record = self
            .cache
            .try_get_with(identity.lookup_key(), self.collector.collect(identity))
            .await
            .map_err(|error| CollectionError::clone(&error))?;

        if store
            && self
                .store
                .upsert_unless_superseded(record.clone())
                .await?
                .is_none()
        {
            tracing::debug!(
                repository = %identity,
                "stored row is newer than the cached record; left untouched"
            );
        }
        Ok(record)
    }

    pub async fn owner_repositories(
        &self,
        owner: &str,
        limit: Option<usize>,
        store: bool,
    ) -> Result<OwnerListing, QueryError> {
        let repositories = self
            .collector
            .list_owner_repositories(owner, limit)
            .await?;

        let recorded = if store {
            let outcome = self
                .store
                .upsert_listing(owner, repositories.clone(), Utc::now())
                .await?;
            tracing::info!(
                %owner,
                stored = outcome.stored,
                updated = outcome.updated,
                "recorded owner listing"
            );
            Some((outcome.stored, outcome.updated))
        } else {
            None
        };

        Ok(OwnerListing {
            repositories,
            recorded,
        })
    }

    pub async fn list(&self, filter: RecordFilter) -> Result<Vec<StoredRecord>, QueryError> {
        Ok(self.store.list(filter).await?)
    }

    /// Aggregates every stored record matching `filter`, ignoring its limit.
    pub async fn aggregate(&self, filter: RecordFilter) -> Result<Aggregation, QueryError> {
        let filter = RecordFilter {
            limit: None,
            ..filter
        };
        let records = self.store.list(filter).await?;
        Ok(Aggregation::from_records(&records))
    }
}
