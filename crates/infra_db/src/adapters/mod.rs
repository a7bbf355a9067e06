//! Domain Adapters
//!
//! PostgreSQL implementations of the `domain_billing` ports. Each adapter
//! delegates SQL to a repository, converts rows into domain types and
//! translates `DatabaseError` into `PortError`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::{PostgresBillingStore, PostgresStudentDirectory};
//! use domain_billing::BillingService;
//!
//! let service = BillingService::new(
//!     Arc::new(PostgresBillingStore::new(pool.clone())),
//!     Arc::new(PostgresStudentDirectory::new(pool)),
//!     Arc::new(SystemClock),
//!     config,
//! )?;
//! ```

pub mod billing;
pub mod students;

pub use billing::PostgresBillingStore;
pub use students::PostgresStudentDirectory;

use chrono::Utc;
use core_kernel::{AdapterHealth, HealthCheckResult};
use sqlx::PgPool;

/// Runs `SELECT 1` against the pool and reports the result
pub(crate) async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();

    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;

    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        },
        Err(e) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(format!("Database error: {}", e)),
            checked_at: Utc::now(),
        },
    }
}
