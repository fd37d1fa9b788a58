//! Insight listing handler

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{AppError, AppState};
use vantage_core::models::{Insight, Page, PageRequest};
use vantage_core::store::InsightStore;

/// GET {base}/all - One page of insights with sector and region names
///
/// Query params are read as raw strings so that a non-numeric `page` or
/// `limit` falls back to its default instead of failing extraction.
pub async fn list_all_insights(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Insight>>, AppError> {
    let request = PageRequest::from_params(
        params.get("page").map(String::as_str),
        params.get("limit").map(String::as_str),
    )?;
    let page = state.store.list_insights(&request).await?;
    Ok(Json(page))
}
