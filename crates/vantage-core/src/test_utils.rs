//! Test utilities for vantage-core
//!
//! Provides an in-process mock PostgREST server backed by a `MemoryStore`,
//! so the REST store can be exercised without a real database.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::models::{LookupTable, NamedRef, NewInsight};
use crate::store::{MemoryStore, ResolvedRow};

#[derive(Clone)]
struct MockState {
    store: MemoryStore,
    api_key: String,
    /// Rows returned per response at most, like PostgREST's `max-rows`
    max_rows: Option<usize>,
}

/// Mock PostgREST server for testing
///
/// Understands the subset of the dialect the REST store speaks: `select`
/// with embedded `{name}` resources (and `!inner`), `col=not.is.null`
/// filters, `limit`, `Range` windows, `Prefer: count=exact` and
/// upserts into lookup tables.
pub struct MockPostgrestServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockPostgrestServer {
    /// Start the mock server on an available port
    pub async fn start(store: MemoryStore, api_key: &str) -> Self {
        Self::start_with_max_rows(store, api_key, None).await
    }

    /// Start a mock server that truncates every response to `max_rows` rows
    pub async fn start_with_max_rows(
        store: MemoryStore,
        api_key: &str,
        max_rows: Option<usize>,
    ) -> Self {
        let state = MockState {
            store,
            api_key: api_key.to_string(),
            max_rows,
        };
        let app = Router::new()
            .route("/:table", get(handle_select).post(handle_insert))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockPostgrestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}

fn authorized(state: &MockState, headers: &HeaderMap) -> bool {
    headers
        .get("apikey")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| key == state.api_key)
}

fn named(name: &Option<String>) -> Value {
    name.as_ref()
        .map(|n| json!({ "name": n }))
        .unwrap_or(Value::Null)
}

/// Every column and every embeddable relation of an insight
///
/// Embeds appear under both the table name and the singular alias used by
/// detail selects; the client ignores keys it didn't ask for.
fn insight_json(row: &ResolvedRow) -> Value {
    let mut value = serde_json::to_value(row.to_insight()).unwrap();
    if let Value::Object(map) = &mut value {
        map.insert("pestle".into(), named(&row.pestle));
        map.insert("sector".into(), named(&row.sector));
        map.insert("region".into(), named(&row.region));
        map.insert("country".into(), named(&row.country));
        map.insert("topic".into(), named(&row.topic));
        map.insert("source".into(), named(&row.source));
    }
    value
}

fn parse_range(headers: &HeaderMap) -> Option<(usize, usize)> {
    let value = headers.get(header::RANGE)?.to_str().ok()?;
    let (from, to) = value.split_once('-')?;
    Some((from.trim().parse().ok()?, to.trim().parse().ok()?))
}

async fn handle_select(
    State(state): State<MockState>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&state, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid API key");
    }

    let rows: Vec<Value> = if table == "insights" {
        match state.store.resolved_rows() {
            Ok(rows) => rows.iter().map(insight_json).collect(),
            Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
        }
    } else {
        let Ok(lookup) = table.parse::<LookupTable>() else {
            return error(
                StatusCode::NOT_FOUND,
                format!("relation \"public.{}\" does not exist", table),
            );
        };
        match state.store.lookup_entries(lookup) {
            Ok(entries) => entries
                .into_iter()
                .map(|e| serde_json::to_value(e).unwrap())
                .collect(),
            Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
        }
    };

    let select = params.get("select").cloned().unwrap_or_default();
    let rows: Vec<Value> = rows
        .into_iter()
        .filter(|row| {
            params
                .iter()
                .filter(|(_, v)| v.as_str() == "not.is.null")
                .all(|(k, _)| !row[k.as_str()].is_null())
        })
        .filter(|row| !select.contains("sectors!inner") || !row["sectors"].is_null())
        .filter(|row| !select.contains("regions!inner") || !row["regions"].is_null())
        .collect();

    let total = rows.len();
    let (from, to) = match params.get("limit").and_then(|l| l.parse::<usize>().ok()) {
        Some(limit) => (0, limit.saturating_sub(1)),
        None => parse_range(&headers).unwrap_or((0, usize::MAX - 1)),
    };

    let exact = headers
        .get("Prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("count=exact"));
    let total_label = if exact {
        total.to_string()
    } else {
        "*".to_string()
    };

    if from > 0 && from >= total {
        let mut response = error(
            StatusCode::RANGE_NOT_SATISFIABLE,
            "Requested range not satisfiable",
        );
        response.headers_mut().insert(
            header::CONTENT_RANGE,
            HeaderValue::from_str(&format!("*/{}", total_label)).unwrap(),
        );
        return response;
    }

    let window: Vec<Value> = rows
        .into_iter()
        .skip(from)
        .take(to.saturating_sub(from).saturating_add(1))
        .take(state.max_rows.unwrap_or(usize::MAX))
        .collect();

    let content_range = if window.is_empty() {
        format!("*/{}", total_label)
    } else {
        format!("{}-{}/{}", from, from + window.len() - 1, total_label)
    };

    let mut response = Json(window).into_response();
    response.headers_mut().insert(
        header::CONTENT_RANGE,
        HeaderValue::from_str(&content_range).unwrap(),
    );
    response
}

async fn handle_insert(
    State(state): State<MockState>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&state, &headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid API key");
    }

    if table == "insights" {
        let rows: Vec<NewInsight> = match serde_json::from_value(body) {
            Ok(rows) => rows,
            Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
        };
        return match state.store.insert_rows(&rows) {
            Ok(_) => StatusCode::CREATED.into_response(),
            Err(e) => error(StatusCode::BAD_REQUEST, e.to_string()),
        };
    }

    let Ok(lookup) = table.parse::<LookupTable>() else {
        return error(
            StatusCode::NOT_FOUND,
            format!("relation \"public.{}\" does not exist", table),
        );
    };
    let names: Vec<NamedRef> = match serde_json::from_value(body) {
        Ok(names) => names,
        Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let names: Vec<String> = names.into_iter().map(|n| n.name).collect();

    match state.store.upsert_names(lookup, &names) {
        Ok(entries) => (StatusCode::CREATED, Json(entries)).into_response(),
        Err(e) => error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}
