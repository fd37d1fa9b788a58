//! Store configuration from the environment
//!
//! Environment variables:
//! - `VANTAGE_STORE_URL`: `http(s)://...` selects the PostgREST store,
//!   `sqlite://<path>`, `file:<path>` or a bare path selects the embedded store
//! - `VANTAGE_STORE_KEY`: API key for the PostgREST store, or the
//!   encryption passphrase for the embedded store

use crate::error::{Error, Result};

pub const STORE_URL_VAR: &str = "VANTAGE_STORE_URL";
pub const STORE_KEY_VAR: &str = "VANTAGE_STORE_KEY";

/// Which backend a store URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Rest,
    Sqlite,
}

/// Connection settings for the insight store
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub url: String,
    pub api_key: String,
}

impl StoreConfig {
    /// Build a config, rejecting empty values
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let url = url.into().trim().to_string();
        let api_key = api_key.into().trim().to_string();

        if url.is_empty() {
            return Err(Error::Config(format!("{} is not set", STORE_URL_VAR)));
        }
        if api_key.is_empty() {
            return Err(Error::Config(format!("{} is not set", STORE_KEY_VAR)));
        }

        Ok(Self { url, api_key })
    }

    /// Read the config from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the config through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(STORE_URL_VAR).unwrap_or_default();
        let api_key = lookup(STORE_KEY_VAR).unwrap_or_default();
        Self::new(url, api_key)
    }

    pub fn kind(&self) -> StoreKind {
        let lower = self.url.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            StoreKind::Rest
        } else {
            StoreKind::Sqlite
        }
    }

    /// Filesystem path of the embedded database, if this is a SQLite URL
    pub fn sqlite_path(&self) -> Option<&str> {
        if self.kind() != StoreKind::Sqlite {
            return None;
        }
        let path = self
            .url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("file:"))
            .unwrap_or(&self.url);
        Some(path)
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_values_fail() {
        let err = StoreConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains(STORE_URL_VAR));

        let err =
            StoreConfig::from_lookup(lookup(&[(STORE_URL_VAR, "https://x.example")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains(STORE_KEY_VAR)));

        let err = StoreConfig::from_lookup(lookup(&[
            (STORE_URL_VAR, "   "),
            (STORE_KEY_VAR, "secret"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_kind_from_url() {
        let config = StoreConfig::new("https://abc.supabase.co/rest/v1", "k").unwrap();
        assert_eq!(config.kind(), StoreKind::Rest);
        assert_eq!(config.sqlite_path(), None);

        let config = StoreConfig::new("sqlite:///var/lib/vantage.db", "k").unwrap();
        assert_eq!(config.kind(), StoreKind::Sqlite);
        assert_eq!(config.sqlite_path(), Some("/var/lib/vantage.db"));

        let config = StoreConfig::new("file:data.db", "k").unwrap();
        assert_eq!(config.sqlite_path(), Some("data.db"));

        let config = StoreConfig::new("data/vantage.db", "k").unwrap();
        assert_eq!(config.sqlite_path(), Some("data/vantage.db"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = StoreConfig::new("http://localhost:3000", "super-secret").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("localhost:3000"));
    }
}
