//! Vantage Core Library
//!
//! Shared functionality for the Vantage insights API:
//! - Domain models and pagination
//! - Aggregations over insight rows (counts, yearly buckets, outliers, sector averages)
//! - Pluggable insight stores (embedded SQLite, PostgREST, in-memory)
//! - CSV import and post-import verification

pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod stats;
pub mod store;
pub mod verify;

/// Test utilities including mock PostgREST server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{StoreConfig, StoreKind};
pub use db::Database;
pub use error::{Error, Result};
pub use import::{parse_csv, ImportStats, Importer, ParsedDataset};
pub use models::{Insight, InsightDetail, LookupTable, Page, PageRequest, Table};
pub use stats::{CategoryCount, OutlierPoint, SectorAverage, YearlyCount};
pub use store::{InsightStore, MemoryStore, RestStore, StoreClient};
pub use verify::{verify_import, VerificationReport};
