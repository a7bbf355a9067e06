//! Report handlers

use axum::{
    extract::{Query, State},
    Extension, Json,
};

use core_kernel::TenantContext;

use super::authorize;
use crate::auth::{permissions, Claims};
use crate::dto::reports::*;
use crate::{error::ApiError, AppState};

/// Students with outstanding balances, most overdue first
pub async fn list_defaulters(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<DefaulterParams>,
) -> Result<Json<Vec<DefaulterResponse>>, ApiError> {
    authorize(&claims, permissions::FEES_READ)?;
    let rows = state.service.list_defaulters(&ctx, params.into()).await?;
    Ok(Json(rows.into_iter().map(DefaulterResponse::from).collect()))
}

/// Per-class collection figures for a period
pub async fn class_summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<ClassSummaryParams>,
) -> Result<Json<Vec<ClassSummaryResponse>>, ApiError> {
    authorize(&claims, permissions::FEES_READ)?;
    let rows = state
        .service
        .class_summary(&ctx, &params.period, params.class_id)
        .await?;
    Ok(Json(rows.into_iter().map(ClassSummaryResponse::from).collect()))
}

/// Collections by payment method
pub async fn collections(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<CollectionParams>,
) -> Result<Json<CollectionReportResponse>, ApiError> {
    authorize(&claims, permissions::FEES_READ)?;
    let report = state
        .service
        .collection_report(&ctx, params.from, params.to)
        .await?;
    Ok(Json(report.into()))
}
