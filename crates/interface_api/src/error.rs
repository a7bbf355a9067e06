//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use domain_billing::BillingError;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generation stopped part-way; `details` lists what was created and what is pending
    #[error("Partial generation: {message}")]
    PartialGeneration {
        message: String,
        details: Vec<String>,
    },
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized".to_string(),
                None,
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg, None),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None),
            ApiError::PartialGeneration { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "partial_generation",
                message,
                Some(details),
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        let message = err.to_string();
        match err {
            BillingError::Validation(_) | BillingError::InvalidPlan(_) => ApiError::Validation(message),
            BillingError::Money(source) => {
                error!(error = %source, "Mixed-currency arithmetic");
                ApiError::Internal(message)
            }
            BillingError::InvoiceNotFound { .. }
            | BillingError::PaymentNotFound { .. }
            | BillingError::StudentNotFound { .. }
            | BillingError::ClassNotFound { .. } => ApiError::NotFound(message),
            BillingError::InsufficientBalance { .. }
            | BillingError::ConcurrencyConflict { .. }
            | BillingError::InvoiceCancelled { .. }
            | BillingError::InvalidOperation { .. } => ApiError::Conflict(message),
            BillingError::PartialGeneration { report, pending, source } => {
                error!(
                    created = report.created.len(),
                    pending = pending.len(),
                    error = %source,
                    "Challan generation interrupted"
                );
                let details = report
                    .created
                    .iter()
                    .map(|invoice| format!("created: {}", invoice.invoice_number))
                    .chain(pending.iter().map(|student| format!("pending: {student}")))
                    .collect();
                ApiError::PartialGeneration { message, details }
            }
            BillingError::Storage(source) if source.is_transient() => {
                error!(error = %source, "Transient storage failure");
                ApiError::Unavailable(message)
            }
            BillingError::Storage(source) => {
                error!(error = %source, "Storage failure");
                ApiError::Internal("storage failure".to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingPermission(permission) => {
                ApiError::Forbidden(format!("missing permission '{permission}'"))
            }
            AuthError::InvalidToken | AuthError::TokenExpired => ApiError::Unauthorized,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reasons: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{field}: {}", reasons.join(", "))
            })
            .collect();
        fields.sort();
        ApiError::Validation(fields.join("; "))
    }
}
