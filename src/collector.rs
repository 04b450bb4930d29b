//! Paginated metrics collection.
//!
//! A run fetches the repository summary once, then walks the issues listing
//! page by page, folding each page into [`AccumulatedMetrics`]. Pages are
//! requested strictly in order because page N decides whether page N+1 is
//! needed. A run is all-or-nothing: the first failure ends it and whatever was
//! accumulated so far is dropped.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use crate::config::AppConfig;
use crate::github::{
    FetchError, GitHubFetcher, OwnerRepository, PageSize, RepositoryIdentity, Resource,
};
use crate::metrics::{AccumulatedMetrics, MetricsRecord};

/// Why a collection run produced no record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectionError {
    #[error("repository '{identity}' not found on GitHub")]
    RepositoryNotFound { identity: RepositoryIdentity },

    #[error("owner '{owner}' not found on GitHub")]
    OwnerNotFound { owner: String },

    #[error("GitHub API rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("request to GitHub API timed out")]
    Timeout,

    #[error("failed to connect to GitHub API: {message}")]
    ServiceUnavailable { message: String },

    #[error("GitHub returned a malformed response: {message}")]
    MalformedUpstreamResponse { message: String },
}

impl CollectionError {
    /// Maps a gateway failure, attributing not-found to `not_found`.
    fn from_fetch(error: FetchError, not_found: impl FnOnce() -> Self) -> Self {
        match error {
            FetchError::NotFound => not_found(),
            FetchError::RateLimited { retry_after_secs } => Self::RateLimited { retry_after_secs },
            FetchError::Timeout => Self::Timeout,
            FetchError::Unreachable { message } => Self::ServiceUnavailable { message },
            FetchError::Malformed { message } => Self::MalformedUpstreamResponse { message },
        }
    }
}

/// Limits applied to every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorConfig {
    pub page_size: PageSize,
    /// Hard stop on the number of pages requested per run.
    pub max_pages: NonZeroU32,
    /// Wall-clock bound on a whole run, across all its requests.
    pub run_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            max_pages: NonZeroU32::new(1000).unwrap_or(NonZeroU32::MAX),
            run_timeout: Duration::from_secs(300),
        }
    }
}

impl From<&AppConfig> for CollectorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            page_size: config.page_size(),
            max_pages: config.max_pages(),
            run_timeout: config.run_timeout(),
        }
    }
}

/// Where a run currently is. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Init,
    FetchingSummary,
    Paginating { page: u32 },
    Done,
    Failed,
}

/// Bookkeeping for one run; never shared and never resumed.
struct Run<'a> {
    identity: &'a RepositoryIdentity,
    state: RunState,
}

impl<'a> Run<'a> {
    const fn new(identity: &'a RepositoryIdentity) -> Self {
        Self {
            identity,
            state: RunState::Init,
        }
    }

    fn advance(&mut self, next: RunState) {
        tracing::trace!(
            owner = %self.identity.owner,
            repo = %self.identity.name,
            from = ?self.state,
            to = ?next,
            "collection state change"
        );
        self.state = next;
    }

    fn fail(&mut self, error: CollectionError) -> CollectionError {
        tracing::error!(
            owner = %self.identity.owner,
            repo = %self.identity.name,
            at = ?self.state,
            %error,
            "collection failed"
        );
        self.advance(RunState::Failed);
        error
    }
}

/// Drives collection runs against a [`GitHubFetcher`].
#[derive(Clone)]
pub struct Collector {
    fetcher: Arc<dyn GitHubFetcher>,
    config: CollectorConfig,
}

impl Collector {
    #[must_use]
    pub fn new(fetcher: Arc<dyn GitHubFetcher>, config: CollectorConfig) -> Self {
        Self { fetcher, config }
    }

    /// Collects a fresh metrics record for `identity`.
    ///
    /// Persisting the record is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns the first failure met during the run, or
    /// [`CollectionError::Timeout`] when the whole run exceeds its time budget.
    pub async fn collect(
        &self,
        identity: &RepositoryIdentity,
    ) -> Result<MetricsRecord, CollectionError> {
        match tokio::time::timeout(self.config.run_timeout, self.run(identity)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    owner = %identity.owner,
                    repo = %identity.name,
                    budget = ?self.config.run_timeout,
                    "collection run exceeded its time budget"
                );
                Err(CollectionError::Timeout)
            }
        }
    }

    async fn run(&self, identity: &RepositoryIdentity) -> Result<MetricsRecord, CollectionError> {
        let mut run = Run::new(identity);
        let not_found = || CollectionError::RepositoryNotFound {
            identity: identity.clone(),
        };

        run.advance(RunState::FetchingSummary);
        let summary = match self.fetcher.fetch_summary(identity).await {
            Ok(summary) => summary,
            Err(error) => return Err(run.fail(CollectionError::from_fetch(error, not_found))),
        };
        tracing::info!(
            owner = %identity.owner,
            repo = %identity.name,
            stars = summary.stars,
            language = summary.language.as_deref().unwrap_or("none"),
            "fetched repository summary"
        );

        let breakdown = match self.paginate(&mut run).await {
            Ok(breakdown) => breakdown,
            Err(error) => return Err(run.fail(CollectionError::from_fetch(error, not_found))),
        };

        run.advance(RunState::Done);
        let record = MetricsRecord::assemble(summary, breakdown, Utc::now());
        tracing::info!(
            owner = %identity.owner,
            repo = %identity.name,
            issues_open = breakdown.issues_open,
            issues_closed = breakdown.issues_closed,
            prs_open = breakdown.prs_open,
            prs_closed = breakdown.prs_closed,
            "collection complete"
        );
        Ok(record)
    }

    async fn paginate(&self, run: &mut Run<'_>) -> Result<AccumulatedMetrics, FetchError> {
        let identity = run.identity;
        let mut metrics = AccumulatedMetrics::default();
        let mut page = NonZeroU32::MIN;

        loop {
            run.advance(RunState::Paginating { page: page.get() });
            let result = self
                .fetcher
                .fetch_page(
                    identity,
                    Resource::IssuesAndPullRequests,
                    page,
                    self.config.page_size,
                )
                .await?;
            metrics = metrics.merge(&result.items);
            tracing::debug!(
                owner = %identity.owner,
                repo = %identity.name,
                page = page.get(),
                items = result.items.len(),
                has_more = result.has_more,
                "merged issues page"
            );

            if !result.has_more {
                break;
            }
            match next_page(page, self.config.max_pages) {
                Some(next) => page = next,
                None => {
                    tracing::warn!(
                        owner = %identity.owner,
                        repo = %identity.name,
                        max_pages = self.config.max_pages.get(),
                        "hit page limit before the last page; counts may be incomplete"
                    );
                    break;
                }
            }
        }

        Ok(metrics)
    }

    /// Lists an owner's repositories, newest activity first.
    ///
    /// Stops at the last page, at `limit` entries, or at the page bound.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Collector::collect`], with
    /// [`CollectionError::OwnerNotFound`] for unknown owners.
    pub async fn list_owner_repositories(
        &self,
        owner: &str,
        limit: Option<usize>,
    ) -> Result<Vec<OwnerRepository>, CollectionError> {
        let walk = self.walk_owner_pages(owner, limit);
        match tokio::time::timeout(self.config.run_timeout, walk).await {
            Ok(result) => result.map_err(|error| {
                let error = CollectionError::from_fetch(error, || CollectionError::OwnerNotFound {
                    owner: owner.to_owned(),
                });
                tracing::error!(%owner, %error, "listing owner repositories failed");
                error
            }),
            Err(_) => Err(CollectionError::Timeout),
        }
    }

    async fn walk_owner_pages(
        &self,
        owner: &str,
        limit: Option<usize>,
    ) -> Result<Vec<OwnerRepository>, FetchError> {
        let mut repositories = Vec::new();
        let mut page = NonZeroU32::MIN;

        loop {
            let result = self
                .fetcher
                .fetch_owner_page(owner, page, self.config.page_size)
                .await?;
            tracing::debug!(%owner, page = page.get(), items = result.items.len(), "fetched repositories page");
            repositories.extend(result.items);

            if let Some(limit) = limit {
                if repositories.len() >= limit {
                    repositories.truncate(limit);
                    tracing::info!(%owner, limit, "reached repository limit");
                    break;
                }
            }
            if !result.has_more {
                break;
            }
            match next_page(page, self.config.max_pages) {
                Some(next) => page = next,
                None => {
                    tracing::warn!(%owner, max_pages = self.config.max_pages.get(), "hit page limit while listing repositories");
                    break;
                }
            }
        }

        tracing::info!(%owner, count = repositories.len(), "listed owner repositories");
        Ok(repositories)
    }
}

fn next_page(current: NonZeroU32, max_pages: NonZeroU32) -> Option<NonZeroU32> {
    if current >= max_pages {
        return None;
    }
    current.checked_add(1)
}
