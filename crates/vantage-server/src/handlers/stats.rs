//! Aggregation handlers
//!
//! Each handler fetches its rows from the store and aggregates them fresh;
//! nothing is cached between requests.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::{AppError, AppState};
use vantage_core::stats::{
    average_by_sector, count_by_category, count_by_year, flag_outliers, CategoryCount,
    OutlierPoint, SectorAverage, YearlyCount,
};
use vantage_core::store::InsightStore;

/// GET {base}/sectors - Number of insights per sector
pub async fn get_sectors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryCount>>, AppError> {
    let names = state.store.sector_names().await?;
    Ok(Json(count_by_category(names.into_iter().map(Some))))
}

/// GET {base}/regions - Number of insights per region
pub async fn get_regions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryCount>>, AppError> {
    let names = state.store.region_names().await?;
    Ok(Json(count_by_category(names.into_iter().map(Some))))
}

/// GET {base}/insights-over-time - Insights added per calendar year, ascending
pub async fn get_insights_over_time(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<YearlyCount>>, AppError> {
    let dates = state.store.added_dates().await?;
    Ok(Json(count_by_year(dates.into_iter().map(Some))))
}

/// GET {base}/likelihood-intensity - Likelihood/intensity points with outlier flags
pub async fn get_likelihood_intensity(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OutlierPoint>>, AppError> {
    let rows = state.store.likelihood_intensity().await?;
    Ok(Json(flag_outliers(&rows)))
}

/// GET {base}/relevance-likelihood - Average relevance and likelihood per sector
pub async fn get_relevance_likelihood(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SectorAverage>>, AppError> {
    let rows = state.store.relevance_likelihood().await?;
    Ok(Json(average_by_sector(&rows)))
}
