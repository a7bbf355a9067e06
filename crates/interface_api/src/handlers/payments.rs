//! Payment handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{InvoiceId, PaymentId, TenantContext};

use super::authorize;
use crate::auth::{permissions, Claims};
use crate::dto::challans::InvoiceResponse;
use crate::dto::payments::*;
use crate::{error::ApiError, AppState};

/// Records a payment against a challan
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<TenantContext>,
    Path(invoice_id): Path<InvoiceId>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentReceiptResponse>), ApiError> {
    authorize(&claims, permissions::FEES_WRITE)?;
    let request = request.into_domain()?;
    let receipt = state.service.record_payment(&ctx, invoice_id, request).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// Lists payments
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<PaymentListParams>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    authorize(&claims, permissions::FEES_READ)?;
    let payments = state.service.list_payments(&ctx, params.into()).await?;
    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect()))
}

/// Deletes a payment and returns the challan it belonged to
pub async fn delete_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<PaymentId>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    authorize(&claims, permissions::FEES_ADMIN)?;
    let view = state.service.delete_payment(&ctx, id).await?;
    Ok(Json(view.into()))
}
