//! Axum request handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::aggregate::Aggregation;
use crate::error::ApiError;
use crate::extract::{ApiPath, ApiQuery};
use crate::github::{validate_owner, OwnerRepository, RepositoryIdentity};
use crate::metrics::DetailedMetrics;
use crate::store::{RecordFilter, StoredRecord, MAX_LIST_LIMIT};
use crate::AppState;

pub const SERVICE_NAME: &str = "repo-metrics";

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
pub struct FetchResponse {
    pub success: bool,
    pub message: String,
    pub data: StoredRecord,
}

#[derive(Serialize)]
pub struct RepoListResponse {
    pub repos: Vec<StoredRecord>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct OwnerReposResponse {
    pub owner: String,
    pub total: usize,
    pub repos: Vec<OwnerRepository>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub owner: Option<String>,
    pub language: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AggregateParams {
    pub owner: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OwnerParams {
    pub limit: Option<u32>,
    #[serde(default = "store_listing_by_default")]
    pub store: bool,
}

fn store_listing_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct DetailsParams {
    #[serde(default)]
    pub store: bool,
}

fn checked_limit(limit: Option<u32>) -> Result<Option<u32>, ApiError> {
    match limit {
        Some(limit) if !(1..=MAX_LIST_LIMIT).contains(&limit) => Err(ApiError::BadRequest(
            format!("limit must be between 1 and {MAX_LIST_LIMIT}"),
        )),
        other => Ok(other),
    }
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "GitHub Metrics Service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "fetch": "/fetch/{owner}/{repo}",
            "repos": "/repos",
            "aggregate": "/aggregate",
            "owner_repos": "/owner/{owner}/repos",
            "github_details": "/github/{owner}/{repo}/details",
        },
    }))
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn fetch_repository(
    ApiPath((owner, repo)): ApiPath<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<FetchResponse>, ApiError> {
    let identity = RepositoryIdentity::parse(&owner, &repo)?;
    let outcome = state.querier.fetch_and_store(&identity).await?;

    let verb = if outcome.created {
        "fetched and stored"
    } else {
        "updated"
    };
    tracing::debug!(repository = %identity, id = outcome.stored.id, "returning fetched metrics");
    Ok(Json(FetchResponse {
        success: true,
        message: format!("Repository '{identity}' {verb} successfully"),
        data: outcome.stored,
    }))
}

pub async fn list_repositories(
    ApiQuery(params): ApiQuery<ListParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<RepoListResponse>, ApiError> {
    let limit = checked_limit(params.limit)?;
    let filter = RecordFilter::new(params.owner.as_deref(), params.language.as_deref(), limit);
    let repos = state.querier.list(filter).await?;

    Ok(Json(RepoListResponse {
        total: repos.len(),
        repos,
    }))
}

pub async fn aggregate(
    ApiQuery(params): ApiQuery<AggregateParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Aggregation>, ApiError> {
    let filter = RecordFilter::new(params.owner.as_deref(), params.language.as_deref(), None);
    Ok(Json(state.querier.aggregate(filter).await?))
}

pub async fn owner_repositories(
    ApiPath(owner): ApiPath<String>,
    ApiQuery(params): ApiQuery<OwnerParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<OwnerReposResponse>, ApiError> {
    let owner = validate_owner(&owner)?;
    let limit = checked_limit(params.limit)?.map(|limit| limit as usize);

    let listing = state
        .querier
        .owner_repositories(&owner, limit, params.store)
        .await?;

    let (stored, updated) = match listing.recorded {
        Some((stored, updated)) => (Some(stored), Some(updated)),
        None => (None, None),
    };
    Ok(Json(OwnerReposResponse {
        owner,
        total: listing.repositories.len(),
        repos: listing.repositories,
        stored,
        updated,
    }))
}

pub async fn repository_details(
    ApiPath((owner, repo)): ApiPath<(String, String)>,
    ApiQuery(params): ApiQuery<DetailsParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DetailedMetrics>, ApiError> {
    let identity = RepositoryIdentity::parse(&owner, &repo)?;
    let record = state.querier.details(&identity, params.store).await?;

    Ok(Json(DetailedMetrics::from(&record)))
}
