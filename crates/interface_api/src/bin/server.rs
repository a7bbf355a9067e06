//! Fee billing API server binary
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin fees-api
//!
//! # Run with environment variables
//! API_PORT=8080 API_DATABASE__URL=postgres://... API_LOG_FORMAT=json cargo run --bin fees-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_DATABASE__URL` - PostgreSQL connection string
//! * `API_DATABASE__MAX_CONNECTIONS`, `API_DATABASE__MIN_CONNECTIONS`,
//!   `API_DATABASE__ACQUIRE_TIMEOUT_SECS`, `API_DATABASE__IDLE_TIMEOUT_SECS` - pool sizing
//! * `API_LOG_LEVEL` - Log level or filter directive (default: info, `RUST_LOG` wins)
//! * `API_LOG_FORMAT` - `pretty` or `json`
//! * `API_BILLING__*` - Billing rules, e.g. `API_BILLING__FISCAL_YEAR_START_MONTH=4`

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::SystemClock;
use domain_billing::BillingService;
use infra_db::{create_pool, run_migrations, PostgresBillingStore, PostgresStudentDirectory};
use interface_api::{
    config::{ApiConfig, LogFormat},
    create_router,
};

/// Initializes logging, loads configuration, connects to the database,
/// applies migrations and serves the API until a shutdown signal arrives.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config.log_level, config.log_format);

    config
        .billing
        .validate()
        .context("invalid billing configuration")?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        currency = %config.billing.currency.code(),
        fiscal_year_start_month = config.billing.fiscal_year_start_month,
        "Starting fee billing API server"
    );

    let pool = create_pool(&config.database)
        .await
        .context("failed to connect to the database")?;

    run_migrations(&pool)
        .await
        .context("failed to apply database migrations")?;

    let service = BillingService::new(
        Arc::new(PostgresBillingStore::new(pool.clone())),
        Arc::new(PostgresStudentDirectory::new(pool)),
        Arc::new(SystemClock),
        config.billing.clone(),
    )
    .context("failed to build billing service")?;

    let app = create_router(Arc::new(service), config.clone());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Installs the tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// In-flight requests complete before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
