//! Balance and status derivation
//!
//! Paid amount, balance and status are never stored as a source of truth.
//! They are recomputed from the challan and its payments on every write and
//! every read, so a report can never disagree with the payments behind it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, MoneyError};

use crate::invoice::{Invoice, InvoiceStatus};
use crate::payment::Payment;

/// Derives a challan's status
///
/// `cancelled` is sticky. Otherwise full payment wins, then any payment,
/// then the due date: a challan is overdue only once `today` is strictly
/// after `due_date`.
pub fn derive_status(
    total: Money,
    paid: Money,
    due_date: NaiveDate,
    today: NaiveDate,
    cancelled: bool,
) -> InvoiceStatus {
    if cancelled {
        InvoiceStatus::Cancelled
    } else if paid.amount() >= total.amount() {
        InvoiceStatus::Paid
    } else if paid.is_positive() {
        InvoiceStatus::PartiallyPaid
    } else if today > due_date {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::Pending
    }
}

/// Derived figures for one challan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    /// Sum of payments recorded against the challan
    pub paid: Money,
    /// `total - paid`
    pub balance: Money,
    pub status: InvoiceStatus,
}

impl Assessment {
    /// Paid amount capped at the challan total
    pub fn collected(&self, total: Money) -> Money {
        self.paid.min(total)
    }
}

/// Sums the payments that belong to `invoice`
pub fn paid_total(invoice: &Invoice, payments: &[Payment]) -> Result<Money, MoneyError> {
    Money::sum(
        invoice.currency(),
        payments
            .iter()
            .filter(|p| p.invoice_id == invoice.id)
            .map(|p| &p.amount),
    )
}

/// Computes paid amount, balance and status of a challan as of `today`
pub fn assess(
    invoice: &Invoice,
    payments: &[Payment],
    today: NaiveDate,
) -> Result<Assessment, MoneyError> {
    let paid = paid_total(invoice, payments)?;
    let balance = invoice.total_amount.checked_sub(&paid)?;
    let status = derive_status(
        invoice.total_amount,
        paid,
        invoice.due_date,
        today,
        invoice.is_cancelled(),
    );
    Ok(Assessment { paid, balance, status })
}
