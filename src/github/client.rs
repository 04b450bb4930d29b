//! Octocrab client construction.

use anyhow::Context;
use http::Uri;
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;

/// Builds an Octocrab client against `api_base`, authenticated when a token is given.
///
/// Octocrab's retry middleware is switched off: retry policy belongs to
/// whoever calls the collector, not to individual page requests.
pub(super) fn build_octocrab_client(token: Option<&str>, api_base: &str) -> anyhow::Result<Octocrab> {
    let base_uri: Uri = api_base
        .parse()
        .with_context(|| format!("invalid GitHub API base URL `{api_base}`"))?;

    let mut builder = Octocrab::builder()
        .base_uri(base_uri)
        .context("failed to apply GitHub API base URL")?
        .add_retry_config(RetryConfig::None);
    if let Some(token) = token {
        builder = builder.personal_token(token.to_owned());
    }

    builder.build().context("failed to build GitHub client")
}
