//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the fee billing engine, built on SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern:
//! - `repositories` own the SQL and the row types, one per table group
//! - `adapters` implement the `domain_billing` ports on top of them and
//!   translate rows into domain types
//!
//! # Consistency
//!
//! Challan balances are never stored. Every payment write locks the challan
//! row (`SELECT ... FOR UPDATE`), re-sums its payments and compares the
//! total with the caller's expectation before writing. Reads that combine a
//! challan with its payments run in a single `REPEATABLE READ` transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresBillingStore};
//!
//! let pool = create_pool(&DatabaseConfig::new("postgres://localhost/fees")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresBillingStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use adapters::{PostgresBillingStore, PostgresStudentDirectory};
