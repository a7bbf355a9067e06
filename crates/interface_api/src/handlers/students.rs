//! Student handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use core_kernel::{StudentId, TenantContext};

use super::authorize;
use crate::auth::{permissions, Claims};
use crate::dto::reports::StudentStatementResponse;
use crate::{error::ApiError, AppState};

/// A student's open challans with totals
pub async fn statement(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<StudentId>,
) -> Result<Json<StudentStatementResponse>, ApiError> {
    authorize(&claims, permissions::FEES_READ)?;
    let statement = state.service.student_statement(&ctx, id).await?;
    Ok(Json(statement.into()))
}
