//! Command implementations for the atelier CLI

pub mod article;
pub mod chat;

use anyhow::{Context, Result};
use atelier_client::ApiClient;
use atelier_core::AtelierConfig;

pub use article::run_article;
pub use chat::run_chat;

/// Config and API client for commands that talk to the site
pub(crate) fn connect() -> Result<(AtelierConfig, ApiClient)> {
    let config = AtelierConfig::load_or_default().context("Failed to load configuration")?;
    let client = ApiClient::from_config(&config).context("Failed to build API client")?;
    tracing::debug!(base_url = %client.base_url(), "using API");
    Ok((config, client))
}
