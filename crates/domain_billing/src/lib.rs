//! Billing Domain - School Fee Challans and Reconciliation
//!
//! This crate implements fee billing for schools: per-period challans
//! (invoices) for students, payments recorded against them, and collection
//! reports.
//!
//! # Components
//!
//! - **Period Resolver** ([`period`]): fee plan + month → period label and dates
//! - **Challan Generator** ([`generator`]): one challan per eligible student,
//!   idempotent on `(student, period)`
//! - **Payment Recorder** ([`recorder`]): optimistic, overpayment-safe
//!   payment writes and corrections
//! - **Balance & Status Engine** ([`status`]): pure derivation of paid amount,
//!   balance and status
//! - **Aggregation & Reporting** ([`reporting`]): defaulters, class summaries,
//!   student statements, collections by method
//!
//! # Ledger invariants
//!
//! - At most one non-cancelled challan per `(school, student, period label)`
//! - `total_amount == Σ line_items.amount`
//! - `balance == total_amount - Σ payments.amount` and `Σ payments <= total`
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingService, GenerationRequest, PaymentRequest, PaymentMethod};
//!
//! let report = service
//!     .generate_challans(&ctx, GenerationRequest::for_class(class_id, 3, 2025))
//!     .await?;
//!
//! let receipt = service
//!     .record_payment(&ctx, report.created[0].id, PaymentRequest::new(dec!(1000), PaymentMethod::Cash))
//!     .await?;
//! assert_eq!(receipt.invoice.status, InvoiceStatus::PartiallyPaid);
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod invoice;
pub mod ledger;
pub mod memory;
pub mod payment;
pub mod period;
pub mod ports;
pub mod recorder;
pub mod reporting;
pub mod service;
pub mod status;
pub mod student;

pub use config::BillingConfig;
pub use error::BillingError;
pub use generator::{
    BillingTarget, ChallanGenerator, GenerationReport, GenerationRequest, SkipReason,
    SkippedStudent,
};
pub use invoice::{
    format_invoice_number, Cancellation, Invoice, InvoiceDraft, InvoiceLineItem, InvoiceStatus,
};
pub use ledger::{InvoiceLedger, InvoiceView};
pub use memory::{InMemoryBillingStore, InMemoryStudentDirectory};
pub use payment::{Payment, PaymentMethod, PaymentRequest};
pub use period::{resolve_period, BillingPeriod, FeePlan, FiscalCalendar};
pub use ports::{BillingStore, InsertOutcome, InvoiceQuery, PaymentQuery, PeriodKey, StudentDirectory};
pub use recorder::{PaymentReceipt, PaymentRecorder};
pub use reporting::{
    ClassSummaryRow, CollectionReport, CollectionRow, DefaulterFilter, DefaulterRow,
    StudentStatement,
};
pub use service::BillingService;
pub use status::{assess, derive_status, Assessment};
pub use student::{SchoolClass, Student, StudentStatus};
