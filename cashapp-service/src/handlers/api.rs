//! JSON endpoints used by the dashboard charts and detail modals.
//!
//! Unlike the HTML pages, authorization failures here return 403 JSON
//! rather than a redirect.

use crate::models::SessionUser;
use crate::services::policy::{authorize, Resource};
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use cashapp_core::error::AppError;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub days: Option<i32>,
}

fn clamp_days(days: Option<i32>) -> i32 {
    days.unwrap_or(30).clamp(1, 365)
}

/// Per-day credit/debit series for the transaction chart.
pub async fn transaction_chart(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Resource::Bai)?;

    let rows = state
        .bai
        .transaction_summary(clamp_days(query.days), &[])
        .await?;

    Ok(Json(json!({ "rows": rows })))
}

/// One payment in full.
pub async fn payment_detail(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path((id, paydate)): Path<(String, NaiveDate)>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Resource::Recon)?;

    let payment = state
        .recon
        .payment_detail(&id, paydate)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Payment {}/{} not found", id, paydate))
        })?;

    Ok(Json(json!({ "payment": payment })))
}

/// Daily payment volume for the recon dashboard chart.
pub async fn daily_stats(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(days): Path<i32>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Resource::Recon)?;

    let rows = state.recon.daily_volume(clamp_days(Some(days))).await?;
    Ok(Json(json!({ "rows": rows })))
}

/// Per-brand volume for the recon dashboard chart.
pub async fn brand_stats(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(days): Path<i32>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Resource::Recon)?;

    let rows = state.recon.brand_breakdown(clamp_days(Some(days))).await?;
    Ok(Json(json!({ "rows": rows })))
}
