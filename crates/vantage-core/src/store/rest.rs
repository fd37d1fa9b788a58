//! PostgREST store (Supabase and compatible)
//!
//! Talks the PostgREST query dialect over HTTP: `select=` with embedded
//! lookup resources, `col=not.is.null` filters, `Range` headers for paging
//! and `Prefer: count=exact` for totals read back from `Content-Range`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, RANGE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::InsightStore;
use crate::error::{Error, Result};
use crate::models::{
    Insight, InsightDetail, LikelihoodIntensityRow, LookupEntry, LookupTable, NamedRef,
    NewInsight, Page, PageRequest, RelevanceLikelihoodRow, Table,
};

/// Rows requested per round-trip when reading a whole column set
///
/// Matches the default `max-rows` of hosted PostgREST. Servers configured
/// lower return short windows and are paged by what they actually send.
const FETCH_BATCH: usize = 1000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const INSIGHT_DETAIL_SELECT: &str = "id,title,added,intensity,likelihood,relevance,impact,\
sector:sectors(name),region:regions(name),country:countries(name),\
topic:topics(name),pestle:pestle(name),source:sources(name)";

#[derive(Debug, Deserialize)]
struct SectorOnly {
    sectors: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct RegionOnly {
    regions: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct AddedOnly {
    added: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LikelihoodIntensityJson {
    likelihood: Option<i64>,
    intensity: Option<i64>,
    title: Option<String>,
    sectors: Option<NamedRef>,
    pestle: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct RelevanceLikelihoodJson {
    relevance: Option<i64>,
    likelihood: Option<i64>,
    sectors: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: Option<String>,
}

/// Store backed by a PostgREST HTTP API
#[derive(Clone)]
pub struct RestStore {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    /// Create a store for the PostgREST root at `base_url`
    ///
    /// For Supabase this is `https://<project>.supabase.co/rest/v1`.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http_client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    /// Fetch every row matching `query`, paging through `Range` windows
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut rows: Vec<T> = Vec::new();
        loop {
            let from = rows.len();
            let response = self
                .request(Method::GET, table)
                .query(query)
                .header("Range-Unit", "items")
                .header(RANGE, format!("{}-{}", from, from + FETCH_BATCH - 1))
                .send()
                .await?;

            if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
                break;
            }
            // The server may cap a window below FETCH_BATCH (`max-rows`), so
            // only an empty window marks the end
            let batch: Vec<T> = check(response).await?.json().await?;
            if batch.is_empty() {
                break;
            }
            rows.extend(batch);
        }
        debug!(table, rows = rows.len(), "Fetched rows");
        Ok(rows)
    }
}

/// Turn a non-2xx response into `Error::Store` with the server's message
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<PostgrestError>(&body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("Store request failed with status {}", status)
            } else {
                body
            }
        });
    Err(Error::Store(message))
}

/// Total row count from a `Content-Range` header (`0-9/42`, `*/0`)
fn parse_total(response: &Response) -> Option<i64> {
    let value = response.headers().get(CONTENT_RANGE)?.to_str().ok()?;
    value.rsplit_once('/')?.1.parse().ok()
}

#[async_trait]
impl InsightStore for RestStore {
    async fn list_insights(&self, request: &PageRequest) -> Result<Page<Insight>> {
        let (from, to) = request.range();
        let response = self
            .request(Method::GET, "insights")
            .query(&[
                ("select", "*,sectors(name),regions(name)"),
                ("order", "id.asc"),
            ])
            .header("Range-Unit", "items")
            .header(RANGE, format!("{}-{}", from, to))
            .header("Prefer", "count=exact")
            .send()
            .await?;

        // Asking past the last row is an empty page, not an error
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            let total = parse_total(&response).unwrap_or(0);
            return Ok(Page::new(request, Vec::new(), total));
        }

        let response = check(response).await?;
        let total = parse_total(&response);
        let data: Vec<Insight> = response.json().await?;
        let total = total.unwrap_or(data.len() as i64);

        Ok(Page::new(request, data, total))
    }

    async fn sector_names(&self) -> Result<Vec<String>> {
        let rows: Vec<SectorOnly> = self
            .fetch_all(
                "insights",
                &[("select", "sectors!inner(name)"), ("order", "id.asc")],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.sectors.map(|s| s.name))
            .collect())
    }

    async fn region_names(&self) -> Result<Vec<String>> {
        let rows: Vec<RegionOnly> = self
            .fetch_all(
                "insights",
                &[("select", "regions!inner(name)"), ("order", "id.asc")],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.regions.map(|s| s.name))
            .collect())
    }

    async fn added_dates(&self) -> Result<Vec<String>> {
        let rows: Vec<AddedOnly> = self
            .fetch_all(
                "insights",
                &[
                    ("select", "added"),
                    ("added", "not.is.null"),
                    ("order", "id.asc"),
                ],
            )
            .await?;
        Ok(rows.into_iter().filter_map(|r| r.added).collect())
    }

    async fn likelihood_intensity(&self) -> Result<Vec<LikelihoodIntensityRow>> {
        let rows: Vec<LikelihoodIntensityJson> = self
            .fetch_all(
                "insights",
                &[
                    ("select", "likelihood,intensity,title,sectors(name),pestle(name)"),
                    ("likelihood", "not.is.null"),
                    ("intensity", "not.is.null"),
                    ("order", "id.asc"),
                ],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                Some(LikelihoodIntensityRow {
                    likelihood: r.likelihood?,
                    intensity: r.intensity?,
                    title: r.title,
                    sector: r.sectors.map(|s| s.name),
                    pestle: r.pestle.map(|p| p.name),
                })
            })
            .collect())
    }

    async fn relevance_likelihood(&self) -> Result<Vec<RelevanceLikelihoodRow>> {
        let rows: Vec<RelevanceLikelihoodJson> = self
            .fetch_all(
                "insights",
                &[
                    ("select", "relevance,likelihood,sectors!inner(name)"),
                    ("relevance", "not.is.null"),
                    ("likelihood", "not.is.null"),
                    ("order", "id.asc"),
                ],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                Some(RelevanceLikelihoodRow {
                    relevance: r.relevance?,
                    likelihood: r.likelihood?,
                    sector: r.sectors?.name,
                })
            })
            .collect())
    }

    async fn upsert_lookup(
        &self,
        table: LookupTable,
        names: &[String],
    ) -> Result<Vec<LookupEntry>> {
        let mut distinct: Vec<&str> = Vec::with_capacity(names.len());
        for name in names {
            if !distinct.contains(&name.as_str()) {
                distinct.push(name);
            }
        }
        if distinct.is_empty() {
            return Ok(Vec::new());
        }

        let body: Vec<NamedRef> = distinct.iter().map(|n| NamedRef::new(*n)).collect();
        let response = self
            .request(Method::POST, table.as_str())
            .query(&[("on_conflict", "name")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&body)
            .send()
            .await?;
        let returned: Vec<LookupEntry> = check(response).await?.json().await?;

        let by_name: HashMap<&str, i64> = returned.iter().map(|e| (e.name.as_str(), e.id)).collect();
        distinct
            .into_iter()
            .map(|name| {
                by_name
                    .get(name)
                    .map(|&id| LookupEntry {
                        id,
                        name: name.to_string(),
                    })
                    .ok_or_else(|| {
                        Error::Store(format!("Upsert into {} did not return \"{}\"", table, name))
                    })
            })
            .collect()
    }

    async fn insert_insights(&self, rows: &[NewInsight]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let response = self
            .request(Method::POST, "insights")
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;
        check(response).await?;
        Ok(rows.len())
    }

    async fn count_rows(&self, table: Table) -> Result<i64> {
        let response = self
            .request(Method::GET, table.as_str())
            .query(&[("select", "id"), ("limit", "1")])
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = check(response).await?;
        parse_total(&response).ok_or_else(|| {
            Error::Store(format!("No row count returned for table {}", table))
        })
    }

    async fn sample_insight(&self) -> Result<Option<InsightDetail>> {
        let response = self
            .request(Method::GET, "insights")
            .query(&[
                ("select", INSIGHT_DETAIL_SELECT),
                ("order", "id.asc"),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let rows: Vec<InsightDetail> = check(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn health_check(&self) -> bool {
        match self
            .request(Method::GET, "insights")
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn describe(&self) -> String {
        format!("postgrest ({})", self.base_url)
    }
}
