//! Health check handler

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;
use vantage_core::store::InsightStore;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: String,
}

/// GET /health - 200 when the store answers, 503 otherwise
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let store = state.store.describe();
    if state.store.health_check().await {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                store,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded",
                store,
            }),
        )
    }
}
