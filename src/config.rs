//! Application configuration and environment variable parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs behavior such as GitHub access, paging
//! limits, timeouts, the details cache and where collected records are stored.

use crate::github::PageSize;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration as StdDuration;

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Optional GitHub Personal Access Token for higher rate limits.
    pub github_token: Option<String>,

    /// Base URL of the GitHub REST API.
    #[serde(default = "default_github_api_base")]
    pub github_api_base: String,

    /// Path of the SQLite database holding collected records (`:memory:` for a throwaway store).
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Timeout applied to each individual GitHub request, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Wall-clock budget for a whole collection run across all pages, in seconds.
    #[serde(default = "default_run_timeout_seconds")]
    pub run_timeout_seconds: u64,

    /// Hard limit on the number of paginated requests to make to the GitHub API per run.
    #[serde(default = "default_max_github_api_pages")]
    pub max_github_api_pages: u32,

    /// Items requested per page. Values above GitHub's maximum of 100 are clamped.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Time to live for cached detailed metrics in seconds.
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// Maximum number of entries to keep in the details cache.
    #[serde(default = "default_cache_max_capacity")]
    pub cache_max_capacity: u64,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_owned()
}

fn default_database_path() -> String {
    "github_metrics.db".to_owned()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_run_timeout_seconds() -> u64 {
    300
}

fn default_max_github_api_pages() -> u32 {
    1000
}

fn default_page_size() -> u32 {
    100
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

fn default_cache_max_capacity() -> u64 {
    1000
}

fn default_port() -> u16 {
    3000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            github_api_base: default_github_api_base(),
            database_path: default_database_path(),
            request_timeout_seconds: default_request_timeout_seconds(),
            run_timeout_seconds: default_run_timeout_seconds(),
            max_github_api_pages: default_max_github_api_pages(),
            page_size: default_page_size(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_max_capacity: default_cache_max_capacity(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// The token to send, ignoring a blank `GITHUB_TOKEN`.
    pub fn github_token(&self) -> Option<&str> {
        self.github_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn request_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.request_timeout_seconds)
    }

    pub fn run_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.run_timeout_seconds)
    }

    pub fn cache_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.cache_ttl_seconds)
    }

    pub fn page_size(&self) -> PageSize {
        PageSize::from_u32(self.page_size)
    }

    /// The page bound, treating zero as one.
    pub fn max_pages(&self) -> NonZeroU32 {
        NonZeroU32::new(self.max_github_api_pages).unwrap_or(NonZeroU32::MIN)
    }
}
