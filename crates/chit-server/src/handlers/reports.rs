//! Spending report handlers

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

use chit_core::db::{CategoryTotal, MerchantTotal};

use crate::{get_user_email, AppError, AppState};

#[derive(Deserialize)]
pub struct CategoryReportParams {
    pub year: Option<i32>,
}

/// GET /api/reports/categories - spend per category, optionally for one year
pub async fn report_categories(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CategoryReportParams>,
) -> Result<Json<Vec<CategoryTotal>>, AppError> {
    let user = get_user_email(&headers);
    Ok(Json(state.db.category_breakdown(&user, params.year)?))
}

/// GET /api/reports/merchants - spend and visits per merchant
pub async fn report_merchants(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<MerchantTotal>>, AppError> {
    let user = get_user_email(&headers);
    Ok(Json(state.db.merchant_totals(&user)?))
}

#[derive(Deserialize)]
pub struct SummaryParams {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub year: i32,
    pub month: u32,
    pub categories: Vec<CategoryTotal>,
}

/// GET /api/reports/summary - per-category totals for one month
///
/// Defaults to the current calendar month.
pub async fn report_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<SummaryParams>,
) -> Result<Json<SummaryResponse>, AppError> {
    let now = chrono::Utc::now();
    let year = params.year.unwrap_or(now.year());
    let month = params.month.unwrap_or(now.month());

    if !(1..=12).contains(&month) {
        return Err(AppError::bad_request("Month must be between 1 and 12"));
    }

    let user = get_user_email(&headers);
    let categories = state.db.monthly_summary(&user, year, month)?;
    Ok(Json(SummaryResponse {
        year,
        month,
        categories,
    }))
}
