//! HTTP API Layer
//!
//! This crate provides the REST API for the fee billing engine using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for challans, payments, reports, students and periods
//! - **Middleware**: Authentication, tenant resolution, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(Arc::new(service), config);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain_billing::BillingService;

use crate::config::ApiConfig;
use crate::handlers::{challans, health, payments, periods, reports, students};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BillingService>,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `service` - Billing service wired to its store and student directory
/// * `config` - API configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(service: Arc<BillingService>, config: ApiConfig) -> Router {
    let state = AppState { service, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let challan_routes = Router::new()
        .route("/", get(challans::list_invoices))
        .route("/generate", post(challans::generate_challans))
        .route("/:id", get(challans::get_invoice).delete(challans::delete_invoice))
        .route("/:id/cancel", post(challans::cancel_invoice))
        .route("/:id/payments", post(payments::record_payment));

    let payment_routes = Router::new()
        .route("/", get(payments::list_payments))
        .route("/:id", delete(payments::delete_payment));

    let report_routes = Router::new()
        .route("/defaulters", get(reports::list_defaulters))
        .route("/class-summary", get(reports::class_summary))
        .route("/collections", get(reports::collections));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/challans", challan_routes)
        .nest("/payments", payment_routes)
        .nest("/reports", report_routes)
        .route("/students/:id/statement", get(students::statement))
        .route("/periods/resolve", get(periods::resolve))
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
