//! Octocrab-backed page fetcher.
//!
//! Each call issues exactly one GET through Octocrab's raw request API so the
//! status line and headers stay visible. Status mapping, continuation and item
//! classification all happen here; nothing is retried.

use std::error::Error as _;
use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use http::{HeaderMap, StatusCode, Uri};
use octocrab::Octocrab;
use serde::de::DeserializeOwned;

use super::client::build_octocrab_client;
use super::error::FetchError;
use super::identity::RepositoryIdentity;
use super::models::{
    ApiIssueItem, ApiOwnerRepository, ApiRepository, IssueLikeItem, OwnerRepository,
    RepositorySummary,
};
use super::page::{has_more_pages, PageResult, PageSize, Resource};
use super::rate_limit::retry_after_hint;
use super::GitHubFetcher;

/// Status, headers and body of a completed request.
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

/// Production [`GitHubFetcher`] talking to the GitHub REST API.
pub struct OctocrabFetcher {
    client: Octocrab,
    request_timeout: Duration,
}

impl OctocrabFetcher {
    /// Wraps an existing Octocrab client.
    #[must_use]
    pub const fn new(client: Octocrab, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    /// Builds a client for `api_base`, attaching the bearer token when present.
    ///
    /// # Errors
    ///
    /// Fails when the base URL cannot be parsed or Octocrab refuses to build.
    pub fn connect(
        token: Option<&str>,
        api_base: &str,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = build_octocrab_client(token, api_base)?;
        Ok(Self::new(client, request_timeout))
    }

    async fn get(&self, route: String) -> Result<RawResponse, FetchError> {
        let uri: Uri = route.parse().map_err(|error| {
            FetchError::unreachable(format!("invalid request path `{route}`: {error}"))
        })?;

        let request = async {
            let response = self.client._get(uri).await.map_err(map_transport_error)?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = self
                .client
                .body_to_string(response)
                .await
                .map_err(map_transport_error)?;
            Ok::<_, FetchError>(RawResponse {
                status,
                headers,
                body,
            })
        };

        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(%route, timeout = ?self.request_timeout, "GitHub request timed out");
                Err(FetchError::Timeout)
            }
        }
    }
}

#[async_trait]
impl GitHubFetcher for OctocrabFetcher {
    async fn fetch_summary(
        &self,
        identity: &RepositoryIdentity,
    ) -> Result<RepositorySummary, FetchError> {
        let response = self
            .get(format!("/repos/{}/{}", identity.owner, identity.name))
            .await?;
        check_status(&response)?;

        let api: ApiRepository = decode(&response.body, "repository")?;
        Ok(api.into_summary(identity))
    }

    async fn fetch_page(
        &self,
        identity: &RepositoryIdentity,
        resource: Resource,
        page: NonZeroU32,
        page_size: PageSize,
    ) -> Result<PageResult<IssueLikeItem>, FetchError> {
        let route = format!(
            "{path}?state=all&page={page}&per_page={per_page}",
            path = resource.path(identity),
            per_page = page_size.get(),
        );
        let response = self.get(route).await?;
        check_status(&response)?;

        let raw: Vec<ApiIssueItem> = decode(&response.body, "issues page")?;
        let has_more = has_more_pages(&response.headers, raw.len(), page_size);
        let items = raw
            .into_iter()
            .map(IssueLikeItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageResult { items, has_more })
    }

    async fn fetch_owner_page(
        &self,
        owner: &str,
        page: NonZeroU32,
        page_size: PageSize,
    ) -> Result<PageResult<OwnerRepository>, FetchError> {
        let route = format!(
            "/users/{owner}/repos?sort=updated&direction=desc&page={page}&per_page={per_page}",
            per_page = page_size.get(),
        );
        let response = self.get(route).await?;
        check_status(&response)?;

        let raw: Vec<ApiOwnerRepository> = decode(&response.body, "repositories page")?;
        let has_more = has_more_pages(&response.headers, raw.len(), page_size);
        let items = raw.into_iter().map(OwnerRepository::from).collect();

        Ok(PageResult { items, has_more })
    }
}

fn check_status(response: &RawResponse) -> Result<(), FetchError> {
    let status = response.status;
    if status.is_success() {
        return Ok(());
    }

    match status {
        StatusCode::NOT_FOUND => Err(FetchError::NotFound),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_secs = retry_after_hint(&response.headers, Utc::now());
            let message = github_message(&response.body).unwrap_or_default();
            tracing::warn!(%status, ?retry_after_secs, %message, "GitHub refused the request");
            Err(FetchError::RateLimited { retry_after_secs })
        }
        status => {
            let message =
                github_message(&response.body).unwrap_or_else(|| "unknown error".to_owned());
            Err(FetchError::unreachable(format!(
                "GitHub returned {status}: {message}"
            )))
        }
    }
}

fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, FetchError> {
    serde_json::from_str(body)
        .map_err(|error| FetchError::malformed(format!("{what} could not be decoded: {error}")))
}

fn github_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
}

fn map_transport_error(error: octocrab::Error) -> FetchError {
    if is_timeout(&error) {
        return FetchError::Timeout;
    }
    FetchError::unreachable(error.to_string())
}

fn is_timeout(error: &octocrab::Error) -> bool {
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
