//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! school fee billing test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built money, dates, tenants and a ready billing harness
//! - `builders`: Builder patterns for students and classes
//! - `database`: PostgreSQL testcontainer management and seeding
//! - `assertions`: Ledger invariant assertions
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
