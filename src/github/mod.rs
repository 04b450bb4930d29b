//! Gateway to the GitHub REST API.
//!
//! The [`GitHubFetcher`] trait is the fetch capability handed to the
//! collector. [`OctocrabFetcher`] is the real implementation; tests substitute
//! mocks or point the real one at a stub server.

mod client;
mod error;
mod fetcher;
mod identity;
mod models;
mod page;
mod rate_limit;

pub use error::FetchError;
pub use fetcher::OctocrabFetcher;
pub use identity::{validate_owner, IdentityError, RepositoryIdentity};
pub use models::{IssueLikeItem, ItemKind, ItemState, OwnerRepository, RepositorySummary};
pub use page::{PageResult, PageSize, Resource, MAX_PAGE_SIZE};

use std::num::NonZeroU32;

use async_trait::async_trait;

/// One-request-per-call access to the GitHub endpoints the collector needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitHubFetcher: Send + Sync {
    /// Fetch stars, language and counters for one repository.
    async fn fetch_summary(
        &self,
        identity: &RepositoryIdentity,
    ) -> Result<RepositorySummary, FetchError>;

    /// Fetch and classify one page of a repository listing.
    async fn fetch_page(
        &self,
        identity: &RepositoryIdentity,
        resource: Resource,
        page: NonZeroU32,
        page_size: PageSize,
    ) -> Result<PageResult<IssueLikeItem>, FetchError>;

    /// Fetch one page of an owner's repositories, most recently updated first.
    async fn fetch_owner_page(
        &self,
        owner: &str,
        page: NonZeroU32,
        page_size: PageSize,
    ) -> Result<PageResult<OwnerRepository>, FetchError>;
}
