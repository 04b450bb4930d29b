pub mod aggregate;
pub mod collector;
pub mod config;
pub mod error;
pub mod extract;
pub mod github;
pub mod handlers;
pub mod metrics;
pub mod querier;
pub mod store;

use axum::{
    routing::{get, post},
    Router,
};
use collector::{Collector, CollectorConfig};
use config::AppConfig;
use github::OctocrabFetcher;
use querier::MetricsQuerier;
use std::sync::Arc;
use store::RecordStore;
use tower_http::trace::TraceLayer;

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Service for collecting, storing and querying repository metrics.
    pub querier: MetricsQuerier,
    /// Application configuration loaded from environment variables.
    pub config: AppConfig,
}

impl AppState {
    /// Initializes the application state: GitHub client, collector, record store and querier.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let fetcher = OctocrabFetcher::connect(
            config.github_token(),
            &config.github_api_base,
            config.request_timeout(),
        )?;
        let collector = Collector::new(Arc::new(fetcher), CollectorConfig::from(&config));
        let store = RecordStore::open(&config.database_path)?;
        tracing::info!(database = %config.database_path, "opened record store");

        let querier = MetricsQuerier::new(collector, store, &config);
        Ok(Self { querier, config })
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/fetch/{owner}/{repo}", post(handlers::fetch_repository))
        .route("/repos", get(handlers::list_repositories))
        .route("/aggregate", get(handlers::aggregate))
        .route("/owner/{owner}/repos", get(handlers::owner_repositories))
        .route(
            "/github/{owner}/{repo}/details",
            get(handlers::repository_details),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
