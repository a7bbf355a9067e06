//! Request handlers

pub mod challans;
pub mod health;
pub mod payments;
pub mod periods;
pub mod reports;
pub mod students;

use crate::auth::{require, Claims};
use crate::error::ApiError;

/// Rejects the request with 403 unless the caller holds `permission`
pub(crate) fn authorize(claims: &Claims, permission: &str) -> Result<(), ApiError> {
    require(claims, permission).map_err(ApiError::from)
}
