//! Billing Domain Ports
//!
//! The billing services depend only on these traits. Two adapters exist:
//!
//! - **PostgreSQL**: `infra_db::PostgresBillingStore` and
//!   `infra_db::PostgresStudentDirectory`, backed by row locks and a partial
//!   unique index
//! - **In-process**: [`crate::memory`], used by tests and local runs
//!
//! # Consistency contract
//!
//! Every method is scoped by `school_id`; an id from another school behaves
//! exactly like an unknown id. Writes that depend on the current payment
//! total take the total the caller based its decision on (`expected_paid`)
//! and must fail with `PortError::Conflict` when the stored total differs,
//! checking and writing atomically.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{
    ClassId, DomainPort, HealthCheckable, InvoiceId, Money, PaymentId, PortError, SchoolId,
    StudentId,
};

use crate::invoice::{Cancellation, Invoice, InvoiceDraft, InvoiceStatus};
use crate::ledger::InvoiceLedger;
use crate::payment::{Payment, PaymentMethod};
use crate::student::{SchoolClass, Student};

/// Identifies the billing slot a student can hold at most one open challan for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub student_id: StudentId,
    pub period_label: String,
}

impl PeriodKey {
    pub fn new(student_id: StudentId, period_label: impl Into<String>) -> Self {
        Self {
            student_id,
            period_label: period_label.into(),
        }
    }
}

/// Result of inserting one draft
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The challan was stored with a freshly allocated number
    Created(Invoice),
    /// A concurrent writer billed the slot first
    AlreadyBilled {
        key: PeriodKey,
        invoice_number: String,
    },
}

/// Query parameters for listing challans
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceQuery {
    pub class_id: Option<ClassId>,
    pub student_id: Option<StudentId>,
    pub period_label: Option<String>,
    /// Matched against the derived status by the service
    pub status: Option<InvoiceStatus>,
    /// Also return cancelled challans
    #[serde(default)]
    pub include_cancelled: bool,
}

impl InvoiceQuery {
    pub fn for_student(student_id: StudentId) -> Self {
        Self {
            student_id: Some(student_id),
            ..Default::default()
        }
    }

    pub fn for_period(period_label: impl Into<String>) -> Self {
        Self {
            period_label: Some(period_label.into()),
            ..Default::default()
        }
    }

    pub fn in_class(mut self, class_id: ClassId) -> Self {
        self.class_id = Some(class_id);
        self
    }

    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns true when the store must return cancelled challans
    pub fn reads_cancelled(&self) -> bool {
        self.include_cancelled || self.status == Some(InvoiceStatus::Cancelled)
    }

    /// Store-side match on the persisted columns
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.class_id.map_or(true, |id| invoice.class_id == id)
            && self.student_id.map_or(true, |id| invoice.student_id == id)
            && self
                .period_label
                .as_deref()
                .map_or(true, |label| invoice.period_label == label)
            && (self.reads_cancelled() || !invoice.is_cancelled())
    }
}

/// Query parameters for listing payments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentQuery {
    pub student_id: Option<StudentId>,
    pub invoice_id: Option<InvoiceId>,
    pub method: Option<PaymentMethod>,
    /// Inclusive lower bound on the payment date
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the payment date
    pub to: Option<NaiveDate>,
}

impl PaymentQuery {
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Default::default()
        }
    }

    pub fn matches(&self, payment: &Payment) -> bool {
        self.student_id.map_or(true, |id| payment.student_id == id)
            && self.invoice_id.map_or(true, |id| payment.invoice_id == id)
            && self.method.map_or(true, |m| payment.method == m)
            && self.from.map_or(true, |from| payment.payment_date >= from)
            && self.to.map_or(true, |to| payment.payment_date <= to)
    }
}

/// Storage port for challans and payments
#[async_trait]
pub trait BillingStore: DomainPort + HealthCheckable {
    /// Looks up open (non-cancelled) challans for the given slots
    ///
    /// # Returns
    ///
    /// The challan number of every slot that is already billed
    async fn find_billed(
        &self,
        school_id: SchoolId,
        keys: &[PeriodKey],
    ) -> Result<HashMap<PeriodKey, String>, PortError>;

    /// Numbers and stores a chunk of drafts in one transaction
    ///
    /// Numbers come from the school's `{prefix}-{year}` sequence, allocated
    /// in the same transaction. Drafts whose slot is already billed are not
    /// written and come back as [`InsertOutcome::AlreadyBilled`]. Outcomes
    /// are returned in draft order.
    async fn insert_invoices(
        &self,
        school_id: SchoolId,
        number_prefix: &str,
        drafts: Vec<InvoiceDraft>,
    ) -> Result<Vec<InsertOutcome>, PortError>;

    /// Reads one challan with its payments from a single snapshot
    async fn get_ledger(
        &self,
        school_id: SchoolId,
        invoice_id: InvoiceId,
    ) -> Result<Option<InvoiceLedger>, PortError>;

    /// Reads challans matching `query` with their payments from a single
    /// snapshot, ordered by period start then challan number
    async fn list_ledgers(
        &self,
        school_id: SchoolId,
        query: &InvoiceQuery,
    ) -> Result<Vec<InvoiceLedger>, PortError>;

    async fn get_payment(
        &self,
        school_id: SchoolId,
        payment_id: PaymentId,
    ) -> Result<Option<Payment>, PortError>;

    /// Lists payments ordered by payment date then creation time
    async fn list_payments(
        &self,
        school_id: SchoolId,
        query: &PaymentQuery,
    ) -> Result<Vec<Payment>, PortError>;

    /// Stores a payment and the challan's new status
    ///
    /// # Errors
    ///
    /// * `PortError::NotFound` - the challan does not exist in the school
    /// * `PortError::Conflict` - the challan is cancelled or its payment total
    ///   is no longer `expected_paid`
    async fn append_payment(
        &self,
        payment: &Payment,
        expected_paid: Money,
        status: InvoiceStatus,
    ) -> Result<(), PortError>;

    /// Deletes a payment and stores the challan's new status
    ///
    /// `expected_paid` is the challan's payment total before the deletion.
    async fn remove_payment(
        &self,
        school_id: SchoolId,
        payment_id: PaymentId,
        expected_paid: Money,
        status: InvoiceStatus,
    ) -> Result<(), PortError>;

    /// Marks a challan cancelled if its payment total is still `expected_paid`
    async fn cancel_invoice(
        &self,
        school_id: SchoolId,
        invoice_id: InvoiceId,
        cancellation: &Cancellation,
        expected_paid: Money,
    ) -> Result<(), PortError>;

    /// Physically deletes a challan and its line items
    ///
    /// # Errors
    ///
    /// `PortError::Conflict` when any payment references the challan
    async fn delete_invoice(&self, school_id: SchoolId, invoice_id: InvoiceId) -> Result<(), PortError>;
}

/// Read-only port onto student and class master data
#[async_trait]
pub trait StudentDirectory: DomainPort {
    async fn get_student(
        &self,
        school_id: SchoolId,
        student_id: StudentId,
    ) -> Result<Option<Student>, PortError>;

    /// Returns every student of the class, active or not, ordered by name
    async fn list_class_students(
        &self,
        school_id: SchoolId,
        class_id: ClassId,
    ) -> Result<Vec<Student>, PortError>;

    async fn get_class(
        &self,
        school_id: SchoolId,
        class_id: ClassId,
    ) -> Result<Option<SchoolClass>, PortError>;

    async fn list_classes(&self, school_id: SchoolId) -> Result<Vec<SchoolClass>, PortError>;
}
