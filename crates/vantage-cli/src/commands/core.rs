//! Shared command utilities

use anyhow::{Context, Result};
use vantage_core::config::{StoreConfig, STORE_KEY_VAR, STORE_URL_VAR};
use vantage_core::store::StoreClient;

/// Open the store named by the environment
pub fn open_store() -> Result<StoreClient> {
    let config = StoreConfig::from_env().with_context(|| {
        format!(
            "Store is not configured; set {} and {} (or add them to .env)",
            STORE_URL_VAR, STORE_KEY_VAR
        )
    })?;
    open_store_with(&config)
}

/// Open the store described by `config`
pub fn open_store_with(config: &StoreConfig) -> Result<StoreClient> {
    StoreClient::from_config(config)
        .with_context(|| format!("Failed to open store at {}", config.url))
}
