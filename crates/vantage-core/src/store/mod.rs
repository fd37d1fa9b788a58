//! Pluggable insight store abstraction
//!
//! # Architecture
//!
//! - `InsightStore` trait: every query the API and importer need
//! - `StoreClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Implementations: `Database` (embedded SQLite), `RestStore` (PostgREST),
//!   `MemoryStore` (tests)
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = StoreClient::from_config(&StoreConfig::from_env()?)?;
//! let page = store.list_insights(&PageRequest::default()).await?;
//! ```

mod memory;
mod rest;
mod sqlite;

pub use memory::MemoryStore;
pub use rest::RestStore;

#[cfg(any(test, feature = "test-utils"))]
pub(crate) use memory::ResolvedRow;

use async_trait::async_trait;

use crate::config::{StoreConfig, StoreKind};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    Insight, InsightDetail, LikelihoodIntensityRow, LookupEntry, LookupTable, NewInsight, Page,
    PageRequest, RelevanceLikelihoodRow, Table,
};

/// Trait defining the interface for all insight stores
///
/// Stores must be Send + Sync so one instance can serve concurrent requests.
#[async_trait]
pub trait InsightStore: Send + Sync {
    /// One page of insights (ordered by id) with sector/region names embedded
    async fn list_insights(&self, request: &PageRequest) -> Result<Page<Insight>>;

    /// Sector name of every insight whose sector is set
    async fn sector_names(&self) -> Result<Vec<String>>;

    /// Region name of every insight whose region is set
    async fn region_names(&self) -> Result<Vec<String>>;

    /// `added` timestamp of every insight where it is set
    async fn added_dates(&self) -> Result<Vec<String>>;

    /// Rows with both likelihood and intensity set
    async fn likelihood_intensity(&self) -> Result<Vec<LikelihoodIntensityRow>>;

    /// Rows with relevance, likelihood and sector all set
    async fn relevance_likelihood(&self) -> Result<Vec<RelevanceLikelihoodRow>>;

    /// Insert missing names, keep existing rows, return `{id, name}` for each name
    async fn upsert_lookup(&self, table: LookupTable, names: &[String])
        -> Result<Vec<LookupEntry>>;

    /// Insert a batch of insights, returning how many were written
    async fn insert_insights(&self, rows: &[NewInsight]) -> Result<usize>;

    async fn count_rows(&self, table: Table) -> Result<i64>;

    /// First insight with every relation resolved
    async fn sample_insight(&self) -> Result<Option<InsightDetail>>;

    /// Check if the store is reachable
    async fn health_check(&self) -> bool;

    /// Human-readable backend description for logs and `/health`
    fn describe(&self) -> String;
}

/// Concrete store client
///
/// The trait has async methods and so is not object-safe without boxing;
/// this enum gives Clone and static dispatch over the known backends.
#[derive(Clone)]
pub enum StoreClient {
    /// Embedded SQLite (SQLCipher) database
    Sqlite(Database),
    /// PostgREST-compatible HTTP API (e.g. Supabase)
    Rest(RestStore),
    /// In-process store for tests
    Memory(MemoryStore),
}

impl StoreClient {
    /// Open the store a config points at
    ///
    /// For SQLite the API key doubles as the encryption passphrase.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        match config.kind() {
            StoreKind::Rest => Ok(StoreClient::Rest(RestStore::new(
                &config.url,
                &config.api_key,
            )?)),
            StoreKind::Sqlite => {
                let path = config.sqlite_path().ok_or_else(|| {
                    Error::Config(format!("Not a SQLite store URL: {}", config.url))
                })?;
                Ok(StoreClient::Sqlite(Database::new(path, &config.api_key)?))
            }
        }
    }

    /// Create an empty in-memory store
    pub fn memory() -> Self {
        StoreClient::Memory(MemoryStore::new())
    }
}

// Implement InsightStore for StoreClient by delegating to the inner store
#[async_trait]
impl InsightStore for StoreClient {
    async fn list_insights(&self, request: &PageRequest) -> Result<Page<Insight>> {
        match self {
            StoreClient::Sqlite(s) => s.list_insights(request).await,
            StoreClient::Rest(s) => s.list_insights(request).await,
            StoreClient::Memory(s) => s.list_insights(request).await,
        }
    }

    async fn sector_names(&self) -> Result<Vec<String>> {
        match self {
            StoreClient::Sqlite(s) => s.sector_names().await,
            StoreClient::Rest(s) => s.sector_names().await,
            StoreClient::Memory(s) => s.sector_names().await,
        }
    }

    async fn region_names(&self) -> Result<Vec<String>> {
        match self {
            StoreClient::Sqlite(s) => s.region_names().await,
            StoreClient::Rest(s) => s.region_names().await,
            StoreClient::Memory(s) => s.region_names().await,
        }
    }

    async fn added_dates(&self) -> Result<Vec<String>> {
        match self {
            StoreClient::Sqlite(s) => s.added_dates().await,
            StoreClient::Rest(s) => s.added_dates().await,
            StoreClient::Memory(s) => s.added_dates().await,
        }
    }

    async fn likelihood_intensity(&self) -> Result<Vec<LikelihoodIntensityRow>> {
        match self {
            StoreClient::Sqlite(s) => s.likelihood_intensity().await,
            StoreClient::Rest(s) => s.likelihood_intensity().await,
            StoreClient::Memory(s) => s.likelihood_intensity().await,
        }
    }

    async fn relevance_likelihood(&self) -> Result<Vec<RelevanceLikelihoodRow>> {
        match self {
            StoreClient::Sqlite(s) => s.relevance_likelihood().await,
            StoreClient::Rest(s) => s.relevance_likelihood().await,
            StoreClient::Memory(s) => s.relevance_likelihood().await,
        }
    }

    async fn upsert_lookup(
        &self,
        table: LookupTable,
        names: &[String],
    ) -> Result<Vec<LookupEntry>> {
        match self {
            StoreClient::Sqlite(s) => s.upsert_lookup(table, names).await,
            StoreClient::Rest(s) => s.upsert_lookup(table, names).await,
            StoreClient::Memory(s) => s.upsert_lookup(table, names).await,
        }
    }

    async fn insert_insights(&self, rows: &[NewInsight]) -> Result<usize> {
        match self {
            StoreClient::Sqlite(s) => s.insert_insights(rows).await,
            StoreClient::Rest(s) => s.insert_insights(rows).await,
            StoreClient::Memory(s) => s.insert_insights(rows).await,
        }
    }

    async fn count_rows(&self, table: Table) -> Result<i64> {
        match self {
            StoreClient::Sqlite(s) => s.count_rows(table).await,
            StoreClient::Rest(s) => s.count_rows(table).await,
            StoreClient::Memory(s) => s.count_rows(table).await,
        }
    }

    async fn sample_insight(&self) -> Result<Option<InsightDetail>> {
        match self {
            StoreClient::Sqlite(s) => s.sample_insight().await,
            StoreClient::Rest(s) => s.sample_insight().await,
            StoreClient::Memory(s) => s.sample_insight().await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            StoreClient::Sqlite(s) => s.health_check().await,
            StoreClient::Rest(s) => s.health_check().await,
            StoreClient::Memory(s) => s.health_check().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            StoreClient::Sqlite(s) => s.describe(),
            StoreClient::Rest(s) => s.describe(),
            StoreClient::Memory(s) => s.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_opens_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("insights.db");
        let config =
            StoreConfig::new(format!("sqlite://{}", path.display()), "passphrase").unwrap();

        let store = StoreClient::from_config(&config).unwrap();
        assert!(matches!(store, StoreClient::Sqlite(_)));
        assert!(store.describe().contains("insights.db"));
    }

    #[test]
    fn test_from_config_builds_rest_client() {
        let config = StoreConfig::new("https://abc.supabase.co/rest/v1/", "anon-key").unwrap();
        let store = StoreClient::from_config(&config).unwrap();
        assert!(matches!(store, StoreClient::Rest(_)));
        assert_eq!(store.describe(), "postgrest (https://abc.supabase.co/rest/v1)");
    }

    #[tokio::test]
    async fn test_memory_client_delegates() {
        let store = StoreClient::memory();
        assert!(store.health_check().await);
        assert_eq!(store.count_rows(Table::Insights).await.unwrap(), 0);
        assert_eq!(store.describe(), "memory");
    }
}
