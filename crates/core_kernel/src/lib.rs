//! Core Kernel - Foundational types for the school fee engine
//!
//! This crate provides the building blocks shared by every layer:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers for schools, students, challans and payments
//! - Tenant context and an injectable clock with school timezones
//! - Port error taxonomy and health-check abstractions

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod tenant;
pub mod ports;
pub mod error;

pub use money::{Money, Currency, MoneyError, Rate};
pub use temporal::{Clock, FixedClock, SystemClock, Timezone};
pub use identifiers::{
    SchoolId, UserId, StudentId, ClassId, InvoiceId, LineItemId, PaymentId,
};
pub use tenant::TenantContext;
pub use ports::{
    PortError, DomainPort, AdapterHealth, HealthCheckResult, HealthCheckable,
};
pub use error::CoreError;
