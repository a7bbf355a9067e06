//! Period handlers

use axum::{
    extract::{Query, State},
    Extension, Json,
};

use super::authorize;
use crate::auth::{permissions, Claims};
use crate::dto::reports::{PeriodResponse, ResolvePeriodParams};
use crate::{error::ApiError, AppState};

/// Resolves a fee plan and month to the period it bills
pub async fn resolve(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ResolvePeriodParams>,
) -> Result<Json<PeriodResponse>, ApiError> {
    authorize(&claims, permissions::FEES_READ)?;
    let period = state
        .service
        .resolve_period(&params.plan, params.month, params.year)?;
    Ok(Json(period.into()))
}
