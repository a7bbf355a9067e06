//! In-process adapters
//!
//! [`InMemoryBillingStore`] and [`InMemoryStudentDirectory`] implement the
//! billing ports over `tokio::sync::RwLock`-guarded maps. Each port call
//! takes the lock once, so every check-then-write is atomic exactly like
//! the `FOR UPDATE` transactions of the PostgreSQL adapter.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use core_kernel::{
    AdapterHealth, ClassId, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, Money,
    PaymentId, PortError, SchoolId, StudentId,
};

use crate::invoice::{format_invoice_number, Cancellation, Invoice, InvoiceDraft, InvoiceStatus};
use crate::ledger::InvoiceLedger;
use crate::payment::Payment;
use crate::ports::{
    BillingStore, InsertOutcome, InvoiceQuery, PaymentQuery, PeriodKey, StudentDirectory,
};
use crate::student::{SchoolClass, Student};

#[derive(Debug, Default)]
struct BillingState {
    invoices: HashMap<InvoiceId, Invoice>,
    payments: HashMap<PaymentId, Payment>,
    sequences: HashMap<(SchoolId, i32), i64>,
}

impl BillingState {
    fn invoice(&self, school_id: SchoolId, invoice_id: InvoiceId) -> Option<&Invoice> {
        self.invoices
            .get(&invoice_id)
            .filter(|invoice| invoice.school_id == school_id)
    }

    fn open_invoice_for(&self, school_id: SchoolId, key: &PeriodKey) -> Option<&Invoice> {
        self.invoices.values().find(|invoice| {
            invoice.school_id == school_id
                && invoice.student_id == key.student_id
                && invoice.period_label == key.period_label
                && !invoice.is_cancelled()
        })
    }

    fn payments_of(&self, invoice_id: InvoiceId) -> Vec<Payment> {
        let mut payments: Vec<Payment> = self
            .payments
            .values()
            .filter(|p| p.invoice_id == invoice_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| {
            a.payment_date
                .cmp(&b.payment_date)
                .then(a.created_at.cmp(&b.created_at))
        });
        payments
    }

    fn paid_total(&self, invoice: &Invoice) -> Result<Money, PortError> {
        Money::sum(
            invoice.currency(),
            self.payments
                .values()
                .filter(|p| p.invoice_id == invoice.id)
                .map(|p| &p.amount),
        )
        .map_err(|e| PortError::transformation(e.to_string()))
    }

    fn ledger(&self, invoice: &Invoice) -> InvoiceLedger {
        InvoiceLedger::new(invoice.clone(), self.payments_of(invoice.id))
    }

    fn next_number(&mut self, school_id: SchoolId, year: i32) -> i64 {
        let next = self.sequences.entry((school_id, year)).or_insert(0);
        *next += 1;
        *next
    }
}

fn expect_paid(invoice: &Invoice, actual: Money, expected: Money) -> Result<(), PortError> {
    if actual != expected {
        return Err(PortError::conflict(format!(
            "payment total on invoice {} is {}, expected {}",
            invoice.id, actual, expected
        )));
    }
    Ok(())
}

/// Billing store kept in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryBillingStore {
    state: Arc<RwLock<BillingState>>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DomainPort for InMemoryBillingStore {}

#[async_trait]
impl HealthCheckable for InMemoryBillingStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult {
            adapter_id: "memory-billing-store".to_string(),
            status: AdapterHealth::Healthy,
            latency_ms: 0,
            message: None,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn find_billed(
        &self,
        school_id: SchoolId,
        keys: &[PeriodKey],
    ) -> Result<HashMap<PeriodKey, String>, PortError> {
        let state = self.state.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| {
                state
                    .open_invoice_for(school_id, key)
                    .map(|invoice| (key.clone(), invoice.invoice_number.clone()))
            })
            .collect())
    }

    async fn insert_invoices(
        &self,
        school_id: SchoolId,
        number_prefix: &str,
        drafts: Vec<InvoiceDraft>,
    ) -> Result<Vec<InsertOutcome>, PortError> {
        let mut state = self.state.write().await;
        let mut outcomes = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let key = PeriodKey::new(draft.student_id, draft.period.label.clone());
            if let Some(existing) = state.open_invoice_for(school_id, &key) {
                outcomes.push(InsertOutcome::AlreadyBilled {
                    invoice_number: existing.invoice_number.clone(),
                    key,
                });
                continue;
            }

            let year = draft.number_year();
            let sequence = state.next_number(school_id, year);
            let invoice =
                draft.into_invoice(school_id, format_invoice_number(number_prefix, year, sequence));
            state.invoices.insert(invoice.id, invoice.clone());
            outcomes.push(InsertOutcome::Created(invoice));
        }

        Ok(outcomes)
    }

    async fn get_ledger(
        &self,
        school_id: SchoolId,
        invoice_id: InvoiceId,
    ) -> Result<Option<InvoiceLedger>, PortError> {
        let state = self.state.read().await;
        Ok(state
            .invoice(school_id, invoice_id)
            .map(|invoice| state.ledger(invoice)))
    }

    async fn list_ledgers(
        &self,
        school_id: SchoolId,
        query: &InvoiceQuery,
    ) -> Result<Vec<InvoiceLedger>, PortError> {
        let state = self.state.read().await;
        let mut invoices: Vec<&Invoice> = state
            .invoices
            .values()
            .filter(|invoice| invoice.school_id == school_id && query.matches(invoice))
            .collect();
        invoices.sort_by(|a, b| {
            a.period_start
                .cmp(&b.period_start)
                .then_with(|| a.invoice_number.cmp(&b.invoice_number))
        });
        Ok(invoices.into_iter().map(|invoice| state.ledger(invoice)).collect())
    }

    async fn get_payment(
        &self,
        school_id: SchoolId,
        payment_id: PaymentId,
    ) -> Result<Option<Payment>, PortError> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .get(&payment_id)
            .filter(|p| p.school_id == school_id)
            .cloned())
    }

    async fn list_payments(
        &self,
        school_id: SchoolId,
        query: &PaymentQuery,
    ) -> Result<Vec<Payment>, PortError> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.school_id == school_id && query.matches(p))
            .cloned()
            .collect();
        payments.sort_by(|a, b| {
            a.payment_date
                .cmp(&b.payment_date)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(payments)
    }

    async fn append_payment(
        &self,
        payment: &Payment,
        expected_paid: Money,
        status: InvoiceStatus,
    ) -> Result<(), PortError> {
        let mut state = self.state.write().await;
        let invoice = state
            .invoice(payment.school_id, payment.invoice_id)
            .ok_or_else(|| PortError::not_found("Invoice", payment.invoice_id))?;
        if invoice.is_cancelled() {
            return Err(PortError::conflict(format!("invoice {} is cancelled", invoice.id)));
        }
        expect_paid(invoice, state.paid_total(invoice)?, expected_paid)?;

        state.payments.insert(payment.id, payment.clone());
        if let Some(invoice) = state.invoices.get_mut(&payment.invoice_id) {
            invoice.status = status;
            invoice.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn remove_payment(
        &self,
        school_id: SchoolId,
        payment_id: PaymentId,
        expected_paid: Money,
        status: InvoiceStatus,
    ) -> Result<(), PortError> {
        let mut state = self.state.write().await;
        let invoice_id = state
            .payments
            .get(&payment_id)
            .filter(|p| p.school_id == school_id)
            .map(|p| p.invoice_id)
            .ok_or_else(|| PortError::not_found("Payment", payment_id))?;
        let invoice = state
            .invoice(school_id, invoice_id)
            .ok_or_else(|| PortError::not_found("Invoice", invoice_id))?;
        expect_paid(invoice, state.paid_total(invoice)?, expected_paid)?;

        state.payments.remove(&payment_id);
        if let Some(invoice) = state.invoices.get_mut(&invoice_id) {
            invoice.status = status;
            invoice.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn cancel_invoice(
        &self,
        school_id: SchoolId,
        invoice_id: InvoiceId,
        cancellation: &Cancellation,
        expected_paid: Money,
    ) -> Result<(), PortError> {
        let mut state = self.state.write().await;
        let invoice = state
            .invoice(school_id, invoice_id)
            .ok_or_else(|| PortError::not_found("Invoice", invoice_id))?;
        if invoice.is_cancelled() {
            return Err(PortError::conflict(format!("invoice {invoice_id} is already cancelled")));
        }
        expect_paid(invoice, state.paid_total(invoice)?, expected_paid)?;

        if let Some(invoice) = state.invoices.get_mut(&invoice_id) {
            invoice.status = InvoiceStatus::Cancelled;
            invoice.cancellation = Some(cancellation.clone());
            invoice.updated_at = cancellation.cancelled_at;
        }
        Ok(())
    }

    async fn delete_invoice(&self, school_id: SchoolId, invoice_id: InvoiceId) -> Result<(), PortError> {
        let mut state = self.state.write().await;
        if state.invoice(school_id, invoice_id).is_none() {
            return Err(PortError::not_found("Invoice", invoice_id));
        }
        if state.payments.values().any(|p| p.invoice_id == invoice_id) {
            return Err(PortError::conflict(format!("invoice {invoice_id} has payments")));
        }
        state.invoices.remove(&invoice_id);
        Ok(())
    }
}

/// Student directory kept in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStudentDirectory {
    students: Arc<RwLock<HashMap<StudentId, Student>>>,
    classes: Arc<RwLock<HashMap<ClassId, SchoolClass>>>,
}

impl InMemoryStudentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory pre-loaded with classes and students
    pub fn with_records(classes: Vec<SchoolClass>, students: Vec<Student>) -> Self {
        Self {
            students: Arc::new(RwLock::new(students.into_iter().map(|s| (s.id, s)).collect())),
            classes: Arc::new(RwLock::new(classes.into_iter().map(|c| (c.id, c)).collect())),
        }
    }

    pub async fn add_class(&self, class: SchoolClass) {
        self.classes.write().await.insert(class.id, class);
    }

    /// Inserts or replaces a student
    pub async fn upsert_student(&self, student: Student) {
        self.students.write().await.insert(student.id, student);
    }
}

impl DomainPort for InMemoryStudentDirectory {}

#[async_trait]
impl StudentDirectory for InMemoryStudentDirectory {
    async fn get_student(
        &self,
        school_id: SchoolId,
        student_id: StudentId,
    ) -> Result<Option<Student>, PortError> {
        Ok(self
            .students
            .read()
            .await
            .get(&student_id)
            .filter(|s| s.school_id == school_id)
            .cloned())
    }

    async fn list_class_students(
        &self,
        school_id: SchoolId,
        class_id: ClassId,
    ) -> Result<Vec<Student>, PortError> {
        let mut students: Vec<Student> = self
            .students
            .read()
            .await
            .values()
            .filter(|s| s.school_id == school_id && s.class_id == class_id)
            .cloned()
            .collect();
        students.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(students)
    }

    async fn get_class(
        &self,
        school_id: SchoolId,
        class_id: ClassId,
    ) -> Result<Option<SchoolClass>, PortError> {
        Ok(self
            .classes
            .read()
            .await
            .get(&class_id)
            .filter(|c| c.school_id == school_id)
            .cloned())
    }

    async fn list_classes(&self, school_id: SchoolId) -> Result<Vec<SchoolClass>, PortError> {
        let mut classes: Vec<SchoolClass> = self
            .classes
            .read()
            .await
            .values()
            .filter(|c| c.school_id == school_id)
            .cloned()
            .collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::InvoiceDraft;
    use crate::payment::PaymentMethod;
    use crate::period::{resolve_period, FeePlan, FiscalCalendar};
    use chrono::NaiveDate;
    use core_kernel::{Currency, UserId};
    use rust_decimal_macros::dec;

    fn draft_for(student: &Student) -> InvoiceDraft {
        let period = resolve_period(FeePlan::Monthly, 3, 2025, &FiscalCalendar::default()).unwrap();
        let issue = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        InvoiceDraft::for_student(student, period, issue, 10, UserId::new(), true).unwrap()
    }

    fn student(school: SchoolId) -> Student {
        Student::new(
            school,
            ClassId::new(),
            "Zainab Ali",
            FeePlan::Monthly,
            Money::new(dec!(3000), Currency::PKR),
        )
    }

    fn payment_for(invoice: &Invoice, amount: rust_decimal::Decimal) -> Payment {
        Payment {
            id: PaymentId::new_v7(),
            school_id: invoice.school_id,
            invoice_id: invoice.id,
            student_id: invoice.student_id,
            amount: Money::new(amount, Currency::PKR),
            payment_date: invoice.issue_date,
            method: PaymentMethod::Cash,
            reference: None,
            periods_covered: vec![],
            notes: None,
            recorded_by: UserId::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_numbers_and_dedups() {
        let store = InMemoryBillingStore::new();
        let school = SchoolId::new();
        let a = student(school);
        let b = student(school);

        let outcomes = store
            .insert_invoices(school, "CH", vec![draft_for(&a), draft_for(&b)])
            .await
            .unwrap();
        let numbers: Vec<String> = outcomes
            .iter()
            .filter_map(|o| match o {
                InsertOutcome::Created(invoice) => Some(invoice.invoice_number.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec!["CH-2025-000001", "CH-2025-000002"]);

        let again = store.insert_invoices(school, "CH", vec![draft_for(&a)]).await.unwrap();
        assert!(matches!(
            &again[0],
            InsertOutcome::AlreadyBilled { invoice_number, .. } if invoice_number == "CH-2025-000001"
        ));
    }

    #[tokio::test]
    async fn test_append_payment_rejects_stale_total() {
        let store = InMemoryBillingStore::new();
        let school = SchoolId::new();
        let outcomes = store
            .insert_invoices(school, "CH", vec![draft_for(&student(school))])
            .await
            .unwrap();
        let InsertOutcome::Created(invoice) = &outcomes[0] else {
            panic!("expected a created invoice");
        };

        let zero = Money::zero(Currency::PKR);
        store
            .append_payment(&payment_for(invoice, dec!(1000)), zero, InvoiceStatus::PartiallyPaid)
            .await
            .unwrap();

        let stale = store
            .append_payment(&payment_for(invoice, dec!(500)), zero, InvoiceStatus::PartiallyPaid)
            .await;
        assert!(matches!(stale, Err(e) if e.is_conflict()));
    }

    #[tokio::test]
    async fn test_other_school_sees_nothing() {
        let store = InMemoryBillingStore::new();
        let school = SchoolId::new();
        let outcomes = store
            .insert_invoices(school, "CH", vec![draft_for(&student(school))])
            .await
            .unwrap();
        let InsertOutcome::Created(invoice) = &outcomes[0] else {
            panic!("expected a created invoice");
        };

        let other = SchoolId::new();
        assert!(store.get_ledger(other, invoice.id).await.unwrap().is_none());
        assert!(store.delete_invoice(other, invoice.id).await.unwrap_err().is_not_found());
    }
}
