//! Repository implementations for billing data
//!
//! Repositories encapsulate SQL and map between database rows and plain
//! row structs; the adapters turn those rows into domain types.
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate compiles
//! without a live database. Enum columns map onto `sqlx::Type` enums.

pub mod billing;
pub mod students;

pub use billing::BillingRepository;
pub use students::StudentRepository;
