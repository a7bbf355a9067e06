//! Billing domain errors

use thiserror::Error;

use core_kernel::{ClassId, InvoiceId, Money, MoneyError, PaymentId, PortError, SchoolId, StudentId};

use crate::generator::GenerationReport;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Malformed input, rejected before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// Fee plan outside monthly / quarterly / annual
    #[error("Invalid fee plan: {0}")]
    InvalidPlan(String),

    #[error("Invoice {invoice_id} not found in school {school_id}")]
    InvoiceNotFound {
        school_id: SchoolId,
        invoice_id: InvoiceId,
    },

    #[error("Payment {payment_id} not found in school {school_id}")]
    PaymentNotFound {
        school_id: SchoolId,
        payment_id: PaymentId,
    },

    #[error("Student {student_id} not found in school {school_id}")]
    StudentNotFound {
        school_id: SchoolId,
        student_id: StudentId,
    },

    #[error("Class {class_id} not found in school {school_id}")]
    ClassNotFound {
        school_id: SchoolId,
        class_id: ClassId,
    },

    /// Payments cannot be recorded against a cancelled challan
    #[error("Invoice {invoice_id} is cancelled")]
    InvoiceCancelled {
        invoice_id: InvoiceId,
        student_id: StudentId,
    },

    /// Payment would exceed the outstanding balance
    #[error("Payment of {requested} exceeds outstanding balance of {balance} on invoice {invoice_id}")]
    InsufficientBalance {
        invoice_id: InvoiceId,
        student_id: StudentId,
        requested: Money,
        balance: Money,
    },

    /// Concurrent writers kept invalidating the balance check
    #[error("Invoice {invoice_id} was modified concurrently, reload and retry")]
    ConcurrencyConflict { invoice_id: InvoiceId },

    /// The challan is in a state that forbids the requested change
    #[error("Invalid operation on invoice {invoice_id}: {message}")]
    InvalidOperation {
        invoice_id: InvoiceId,
        message: String,
    },

    /// A storage failure interrupted a multi-chunk generation run
    #[error(
        "Challan generation interrupted after {} invoices ({} students pending): {source}",
        .report.created.len(),
        .pending.len()
    )]
    PartialGeneration {
        report: Box<GenerationReport>,
        pending: Vec<StudentId>,
        #[source]
        source: PortError,
    },

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Storage error: {0}")]
    Storage(#[from] PortError),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    /// Returns true when repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::ConcurrencyConflict { .. } => true,
            BillingError::Storage(source) | BillingError::PartialGeneration { source, .. } => {
                source.is_transient()
            }
            _ => false,
        }
    }

    /// Returns true for any of the not-found variants
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BillingError::InvoiceNotFound { .. }
                | BillingError::PaymentNotFound { .. }
                | BillingError::StudentNotFound { .. }
                | BillingError::ClassNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_balance_message() {
        let err = BillingError::InsufficientBalance {
            invoice_id: InvoiceId::new(),
            student_id: StudentId::new(),
            requested: Money::new(dec!(1), Currency::PKR),
            balance: Money::zero(Currency::PKR),
        };
        let message = err.to_string();
        assert!(message.contains("Rs 1.00"));
        assert!(message.contains("Rs 0.00"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(BillingError::ConcurrencyConflict { invoice_id: InvoiceId::new() }.is_retryable());
        assert!(BillingError::Storage(PortError::connection("reset")).is_retryable());
        assert!(!BillingError::Storage(PortError::validation("bad")).is_retryable());
        assert!(!BillingError::validation("bad month").is_retryable());
    }

    #[test]
    fn test_partial_generation_message() {
        let err = BillingError::PartialGeneration {
            report: Box::new(GenerationReport::default()),
            pending: vec![StudentId::new(), StudentId::new()],
            source: PortError::connection("pool closed"),
        };
        assert!(err.to_string().contains("0 invoices (2 students pending)"));
        assert!(err.is_retryable());
    }
}
