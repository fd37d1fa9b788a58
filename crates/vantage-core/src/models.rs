//! Domain models for Vantage

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Page number used when the client sends none (or garbage)
pub const DEFAULT_PAGE: i64 = 1;

/// Page size used when the client sends none (or garbage)
pub const DEFAULT_LIMIT: i64 = 10;

/// Largest page size served; larger requests are clamped
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Lookup tables that normalize the categorical columns of the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupTable {
    Sectors,
    Regions,
    Countries,
    Topics,
    Pestle,
    Sources,
}

impl LookupTable {
    pub const ALL: [LookupTable; 6] = [
        Self::Sectors,
        Self::Regions,
        Self::Countries,
        Self::Topics,
        Self::Pestle,
        Self::Sources,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sectors => "sectors",
            Self::Regions => "regions",
            Self::Countries => "countries",
            Self::Topics => "topics",
            Self::Pestle => "pestle",
            Self::Sources => "sources",
        }
    }
}

impl std::str::FromStr for LookupTable {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sectors" | "sector" => Ok(Self::Sectors),
            "regions" | "region" => Ok(Self::Regions),
            "countries" | "country" => Ok(Self::Countries),
            "topics" | "topic" => Ok(Self::Topics),
            "pestle" => Ok(Self::Pestle),
            "sources" | "source" => Ok(Self::Sources),
            _ => Err(format!("Unknown lookup table: {}", s)),
        }
    }
}

impl std::fmt::Display for LookupTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Any table the store can count rows in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Insights,
    Lookup(LookupTable),
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insights => "insights",
            Self::Lookup(table) => table.as_str(),
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An embedded `{name}` object from a joined lookup table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

impl NamedRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A row of the insights table with sector and region names embedded
///
/// Serialized with the relation objects under `sectors` / `regions`, which is
/// the shape the listing endpoint returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: i64,
    #[serde(default)]
    pub end_year: Option<i64>,
    #[serde(default)]
    pub intensity: Option<i64>,
    #[serde(default)]
    pub impact: Option<i64>,
    #[serde(default)]
    pub likelihood: Option<i64>,
    #[serde(default)]
    pub relevance: Option<i64>,
    #[serde(default)]
    pub start_year: Option<i64>,
    #[serde(default)]
    pub added: Option<String>,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub insight: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sector_id: Option<i64>,
    #[serde(default)]
    pub region_id: Option<i64>,
    #[serde(default)]
    pub country_id: Option<i64>,
    #[serde(default)]
    pub topic_id: Option<i64>,
    #[serde(default)]
    pub pestle_id: Option<i64>,
    #[serde(default)]
    pub source_id: Option<i64>,
    #[serde(default)]
    pub sectors: Option<NamedRef>,
    #[serde(default)]
    pub regions: Option<NamedRef>,
}

/// An insight with every relation resolved (used by import verification)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightDetail {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub added: Option<String>,
    #[serde(default)]
    pub intensity: Option<i64>,
    #[serde(default)]
    pub likelihood: Option<i64>,
    #[serde(default)]
    pub relevance: Option<i64>,
    #[serde(default)]
    pub impact: Option<i64>,
    #[serde(default)]
    pub sector: Option<NamedRef>,
    #[serde(default)]
    pub region: Option<NamedRef>,
    #[serde(default)]
    pub country: Option<NamedRef>,
    #[serde(default)]
    pub topic: Option<NamedRef>,
    #[serde(default)]
    pub pestle: Option<NamedRef>,
    #[serde(default)]
    pub source: Option<NamedRef>,
}

/// A new insight row ready for insertion (foreign keys already resolved)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewInsight {
    pub end_year: Option<i64>,
    pub intensity: Option<i64>,
    pub impact: Option<i64>,
    pub likelihood: Option<i64>,
    pub relevance: Option<i64>,
    pub start_year: Option<i64>,
    pub added: Option<String>,
    pub published: Option<String>,
    pub url: Option<String>,
    pub insight: Option<String>,
    pub title: Option<String>,
    pub sector_id: Option<i64>,
    pub region_id: Option<i64>,
    pub country_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub pestle_id: Option<i64>,
    pub source_id: Option<i64>,
}

/// `{id, name}` row of a lookup table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub id: i64,
    pub name: String,
}

/// Input row for outlier detection
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodIntensityRow {
    pub likelihood: i64,
    pub intensity: i64,
    pub title: Option<String>,
    pub sector: Option<String>,
    pub pestle: Option<String>,
}

/// Input row for per-sector averages
#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceLikelihoodRow {
    pub relevance: i64,
    pub likelihood: i64,
    pub sector: String,
}

/// Validated offset/limit pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Build a page request, rejecting non-positive values and clamping the
    /// page size to `MAX_PAGE_LIMIT`
    pub fn new(page: i64, limit: i64) -> Result<Self> {
        if page < 1 {
            return Err(Error::InvalidData(format!(
                "page must be at least 1 (got {})",
                page
            )));
        }
        if limit < 1 {
            return Err(Error::InvalidData(format!(
                "limit must be at least 1 (got {})",
                limit
            )));
        }
        let limit = limit.min(MAX_PAGE_LIMIT);
        if page.checked_mul(limit).is_none() {
            return Err(Error::InvalidData(format!("page {} is out of range", page)));
        }
        Ok(Self { page, limit })
    }

    /// Build a page request from raw query-string values
    ///
    /// Missing or non-integer values fall back to the defaults.
    pub fn from_params(page: Option<&str>, limit: Option<&str>) -> Result<Self> {
        let page = parse_param(page).unwrap_or(DEFAULT_PAGE);
        let limit = parse_param(limit).unwrap_or(DEFAULT_LIMIT);
        Self::new(page, limit)
    }

    /// Zero-based offset of the first row on this page
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    /// Inclusive `(first, last)` row range covered by this page
    pub fn range(&self) -> (i64, i64) {
        (self.offset(), self.page * self.limit - 1)
    }
}

fn parse_param(value: Option<&str>) -> Option<i64> {
    let value = value?.trim();
    match value.parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) => {
            if !value.is_empty() {
                tracing::debug!(value, "Ignoring non-numeric pagination parameter");
            }
            None
        }
    }
}

/// One page of results plus the total number of matching rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(request: &PageRequest, data: Vec<T>, total: i64) -> Self {
        Self {
            data,
            page: request.page,
            limit: request.limit,
            total,
        }
    }
}
