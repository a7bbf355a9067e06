//! Challan handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::info;

use core_kernel::{InvoiceId, TenantContext};

use super::authorize;
use crate::auth::{permissions, Claims};
use crate::dto::challans::*;
use crate::{error::ApiError, AppState};

/// Generates challans for a class or a single student
pub async fn generate_challans(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<GenerateChallansRequest>,
) -> Result<(StatusCode, Json<GenerationResponse>), ApiError> {
    authorize(&claims, permissions::FEES_WRITE)?;
    let request = request.into_domain()?;

    let report = state.service.generate_challans(&ctx, request).await?;
    info!(
        school_id = %ctx.school_id,
        created = report.created_count(),
        skipped = report.skipped_count(),
        "Challans generated"
    );

    Ok((StatusCode::CREATED, Json(report.into())))
}

/// Lists challans
pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<InvoiceListParams>,
) -> Result<Json<Vec<InvoiceResponse>>, ApiError> {
    authorize(&claims, permissions::FEES_READ)?;
    let views = state.service.list_invoices(&ctx, params.into()).await?;
    Ok(Json(views.into_iter().map(InvoiceResponse::from).collect()))
}

/// Gets a challan by ID
pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    authorize(&claims, permissions::FEES_READ)?;
    let view = state.service.get_invoice(&ctx, id).await?;
    Ok(Json(view.into()))
}

/// Cancels a challan
pub async fn cancel_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<InvoiceId>,
    Json(request): Json<CancelInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    authorize(&claims, permissions::FEES_ADMIN)?;
    validator::Validate::validate(&request)?;
    let view = state.service.cancel_invoice(&ctx, id, &request.reason).await?;
    Ok(Json(view.into()))
}

/// Deletes a challan that has no payments
pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<InvoiceId>,
) -> Result<StatusCode, ApiError> {
    authorize(&claims, permissions::FEES_ADMIN)?;
    state.service.delete_invoice(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
