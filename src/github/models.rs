//! Domain models decoded from GitHub API payloads.
//!
//! The `Api*` structs mirror the raw JSON and stay private to the gateway.
//! Conversion into domain types is where shape validation happens: an item
//! that cannot be classified is rejected rather than coerced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::FetchError;
use super::identity::RepositoryIdentity;

/// Whether an element of the issues listing is a plain issue or a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Issue,
    PullRequest,
}

/// Open/closed state of an issue or pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    Open,
    Closed,
}

/// One element of the issues-and-pull-requests listing, classified on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IssueLikeItem {
    pub kind: ItemKind,
    pub state: ItemState,
}

impl IssueLikeItem {
    #[must_use]
    pub const fn new(kind: ItemKind, state: ItemState) -> Self {
        Self { kind, state }
    }
}

/// Repository metadata from the single non-paginated summary call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySummary {
    pub identity: RepositoryIdentity,
    pub stars: u64,
    pub language: Option<String>,
    /// GitHub's own open issue counter (issues and pull requests combined).
    pub open_issues_count: u64,
}

/// Repository entry as listed for an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerRepository {
    pub name: String,
    pub full_name: String,
    pub owner: String,
    pub description: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub language: Option<String>,
    pub is_private: bool,
    pub is_fork: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiIssueItem {
    #[serde(default)]
    number: Option<u64>,
    #[serde(default)]
    state: Option<String>,
    /// Present (and non-null) only on pull requests.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl TryFrom<ApiIssueItem> for IssueLikeItem {
    type Error = FetchError;

    fn try_from(api: ApiIssueItem) -> Result<Self, Self::Error> {
        let describe = || match api.number {
            Some(number) => format!("item #{number}"),
            None => "item without a number".to_owned(),
        };

        let state = match api.state.as_deref() {
            Some("open") => ItemState::Open,
            Some("closed") => ItemState::Closed,
            Some(other) => {
                return Err(FetchError::malformed(format!(
                    "{} has unknown state `{other}`",
                    describe()
                )))
            }
            None => {
                return Err(FetchError::malformed(format!(
                    "{} is missing its state",
                    describe()
                )))
            }
        };

        let kind = if api.pull_request.is_some() {
            ItemKind::PullRequest
        } else {
            ItemKind::Issue
        };

        Ok(Self { kind, state })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiRepository {
    stargazers_count: u64,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    open_issues_count: u64,
}

impl ApiRepository {
    pub(crate) fn into_summary(self, identity: &RepositoryIdentity) -> RepositorySummary {
        RepositorySummary {
            identity: identity.clone(),
            stars: self.stargazers_count,
            language: self.language,
            open_issues_count: self.open_issues_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiOwnerRepository {
    name: String,
    full_name: String,
    owner: ApiOwner,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    open_issues_count: u64,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl From<ApiOwnerRepository> for OwnerRepository {
    fn from(api: ApiOwnerRepository) -> Self {
        Self {
            name: api.name,
            full_name: api.full_name,
            owner: api.owner.login,
            description: api.description,
            stars: api.stargazers_count,
            forks: api.forks_count,
            open_issues: api.open_issues_count,
            language: api.language,
            is_private: api.private,
            is_fork: api.fork,
            created_at: api.created_at,
            updated_at: api.updated_at,
            pushed_at: api.pushed_at,
            url: api.html_url,
            api_url: api.url,
        }
    }
}
