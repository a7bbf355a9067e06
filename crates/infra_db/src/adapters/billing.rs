//! PostgreSQL Billing Store
//!
//! Implements the [`BillingStore`] port over [`BillingRepository`].
//!
//! # Error Handling
//!
//! Database errors are translated to `PortError` variants:
//! - `DatabaseError::NotFound` -> `PortError::NotFound`
//! - `DatabaseError::Conflict` and duplicate keys -> `PortError::Conflict`
//! - connection and pool errors -> transient `PortError`s
//! - other errors -> `PortError::Internal`

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use core_kernel::{
    ClassId, Currency, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, LineItemId,
    Money, MoneyError, PaymentId, PortError, SchoolId, StudentId, UserId,
};
use domain_billing::{
    BillingStore, Cancellation, FeePlan, InsertOutcome, Invoice, InvoiceDraft, InvoiceLedger,
    InvoiceLineItem, InvoiceQuery, InvoiceStatus, Payment, PaymentMethod, PaymentQuery, PeriodKey,
};
use sqlx::PgPool;

use crate::repositories::billing::{
    BillingRepository, FeePlanType, InsertedInvoice, InvoiceFilter, InvoiceSnapshot,
    InvoiceStatusType, LineItemRow, NewCancellation, NewInvoice, NewLineItem, NewPayment,
    PaymentFilter, PaymentMethodType, PaymentRow,
};

/// PostgreSQL-backed implementation of the [`BillingStore`] port
///
/// Health checks run `SELECT 1` against the pool.
#[derive(Debug, Clone)]
pub struct PostgresBillingStore {
    repository: BillingRepository,
    pool: PgPool,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: BillingRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &BillingRepository {
        &self.repository
    }
}

impl DomainPort for PostgresBillingStore {}

#[async_trait]
impl HealthCheckable for PostgresBillingStore {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(&self.pool, "postgres-billing-store").await
    }
}

#[async_trait]
impl BillingStore for PostgresBillingStore {
    #[instrument(skip(self, keys), fields(school_id = %school_id, keys = keys.len()))]
    async fn find_billed(
        &self,
        school_id: SchoolId,
        keys: &[PeriodKey],
    ) -> Result<HashMap<PeriodKey, String>, PortError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let (student_ids, labels): (Vec<_>, Vec<_>) = keys
            .iter()
            .map(|key| (*key.student_id.as_uuid(), key.period_label.clone()))
            .unzip();

        let rows = self
            .repository
            .find_open_invoices(*school_id.as_uuid(), &student_ids, &labels)
            .await?;
        debug!(billed = rows.len(), "Looked up billed slots");

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    PeriodKey::new(StudentId::from_uuid(row.student_id), row.period_label),
                    row.invoice_number,
                )
            })
            .collect())
    }

    #[instrument(skip(self, drafts), fields(school_id = %school_id, drafts = drafts.len()))]
    async fn insert_invoices(
        &self,
        school_id: SchoolId,
        number_prefix: &str,
        drafts: Vec<InvoiceDraft>,
    ) -> Result<Vec<InsertOutcome>, PortError> {
        let rows = drafts.iter().map(new_invoice).collect();
        let results = self
            .repository
            .insert_invoices(*school_id.as_uuid(), number_prefix, rows)
            .await?;
        if results.len() != drafts.len() {
            return Err(PortError::internal(format!(
                "inserted {} results for {} drafts",
                results.len(),
                drafts.len()
            )));
        }

        let outcomes: Vec<InsertOutcome> = drafts
            .into_iter()
            .zip(results)
            .map(|(draft, result)| match result {
                InsertedInvoice::Created { invoice_number } => {
                    InsertOutcome::Created(draft.into_invoice(school_id, invoice_number))
                }
                InsertedInvoice::AlreadyBilled { invoice_number } => InsertOutcome::AlreadyBilled {
                    key: PeriodKey::new(draft.student_id, draft.period.label),
                    invoice_number,
                },
            })
            .collect();
        info!(
            created = outcomes.iter().filter(|o| matches!(o, InsertOutcome::Created(_))).count(),
            "Invoice chunk stored"
        );
        Ok(outcomes)
    }

    #[instrument(skip(self), fields(school_id = %school_id, invoice_id = %invoice_id))]
    async fn get_ledger(
        &self,
        school_id: SchoolId,
        invoice_id: InvoiceId,
    ) -> Result<Option<InvoiceLedger>, PortError> {
        self.repository
            .get_invoice(*school_id.as_uuid(), *invoice_id.as_uuid())
            .await?
            .map(ledger_from_snapshot)
            .transpose()
    }

    #[instrument(skip(self, query), fields(school_id = %school_id))]
    async fn list_ledgers(
        &self,
        school_id: SchoolId,
        query: &InvoiceQuery,
    ) -> Result<Vec<InvoiceLedger>, PortError> {
        let filter = InvoiceFilter {
            class_id: query.class_id.map(|id| *id.as_uuid()),
            student_id: query.student_id.map(|id| *id.as_uuid()),
            period_label: query.period_label.clone(),
            include_cancelled: query.reads_cancelled(),
        };
        let snapshots = self
            .repository
            .list_invoices(*school_id.as_uuid(), &filter)
            .await?;
        debug!(count = snapshots.len(), "Fetched invoices");
        snapshots.into_iter().map(ledger_from_snapshot).collect()
    }

    async fn get_payment(
        &self,
        school_id: SchoolId,
        payment_id: PaymentId,
    ) -> Result<Option<Payment>, PortError> {
        self.repository
            .get_payment(*school_id.as_uuid(), *payment_id.as_uuid())
            .await?
            .map(payment_from_row)
            .transpose()
    }

    #[instrument(skip(self, query), fields(school_id = %school_id))]
    async fn list_payments(
        &self,
        school_id: SchoolId,
        query: &PaymentQuery,
    ) -> Result<Vec<Payment>, PortError> {
        let filter = PaymentFilter {
            student_id: query.student_id.map(|id| *id.as_uuid()),
            invoice_id: query.invoice_id.map(|id| *id.as_uuid()),
            method: query.method.map(payment_method_to_db),
            from: query.from,
            to: query.to,
        };
        self.repository
            .list_payments(*school_id.as_uuid(), &filter)
            .await?
            .into_iter()
            .map(payment_from_row)
            .collect()
    }

    #[instrument(skip(self, payment), fields(invoice_id = %payment.invoice_id, amount = %payment.amount))]
    async fn append_payment(
        &self,
        payment: &Payment,
        expected_paid: Money,
        status: InvoiceStatus,
    ) -> Result<(), PortError> {
        let row = NewPayment {
            id: *payment.id.as_uuid(),
            school_id: *payment.school_id.as_uuid(),
            invoice_id: *payment.invoice_id.as_uuid(),
            student_id: *payment.student_id.as_uuid(),
            amount: payment.amount.amount(),
            currency: payment.amount.currency().code().to_string(),
            payment_date: payment.payment_date,
            method: payment_method_to_db(payment.method),
            reference: payment.reference.clone(),
            periods_covered: payment.periods_covered.clone(),
            notes: payment.notes.clone(),
            recorded_by: *payment.recorded_by.as_uuid(),
            created_at: payment.created_at,
        };
        self.repository
            .append_payment(row, expected_paid.amount(), status_to_db(status))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(school_id = %school_id, payment_id = %payment_id))]
    async fn remove_payment(
        &self,
        school_id: SchoolId,
        payment_id: PaymentId,
        expected_paid: Money,
        status: InvoiceStatus,
    ) -> Result<(), PortError> {
        self.repository
            .remove_payment(
                *school_id.as_uuid(),
                *payment_id.as_uuid(),
                expected_paid.amount(),
                status_to_db(status),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, cancellation), fields(school_id = %school_id, invoice_id = %invoice_id))]
    async fn cancel_invoice(
        &self,
        school_id: SchoolId,
        invoice_id: InvoiceId,
        cancellation: &Cancellation,
        expected_paid: Money,
    ) -> Result<(), PortError> {
        let row = NewCancellation {
            cancelled_at: cancellation.cancelled_at,
            cancelled_by: *cancellation.cancelled_by.as_uuid(),
            reason: cancellation.reason.clone(),
        };
        self.repository
            .cancel_invoice(*school_id.as_uuid(), *invoice_id.as_uuid(), &row, expected_paid.amount())
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(school_id = %school_id, invoice_id = %invoice_id))]
    async fn delete_invoice(&self, school_id: SchoolId, invoice_id: InvoiceId) -> Result<(), PortError> {
        self.repository
            .delete_invoice(*school_id.as_uuid(), *invoice_id.as_uuid())
            .await?;
        Ok(())
    }
}

fn new_invoice(draft: &InvoiceDraft) -> NewInvoice {
    NewInvoice {
        id: *draft.id.as_uuid(),
        student_id: *draft.student_id.as_uuid(),
        student_name: draft.student_name.clone(),
        class_id: *draft.class_id.as_uuid(),
        fee_plan: fee_plan_to_db(draft.period.plan),
        period_label: draft.period.label.clone(),
        period_start: draft.period.start,
        period_end: draft.period.end,
        issue_date: draft.issue_date,
        due_date: draft.due_date,
        total_amount: draft.total_amount.amount(),
        currency: draft.total_amount.currency().code().to_string(),
        line_items: draft
            .line_items
            .iter()
            .map(|item| NewLineItem {
                id: *item.id.as_uuid(),
                description: item.description.clone(),
                amount: item.amount.amount(),
            })
            .collect(),
        created_by: *draft.created_by.as_uuid(),
        created_at: draft.created_at,
    }
}

fn parse_currency(code: &str) -> Result<Currency, PortError> {
    code.parse()
        .map_err(|e: MoneyError| PortError::transformation(e.to_string()))
}

fn ledger_from_snapshot(snapshot: InvoiceSnapshot) -> Result<InvoiceLedger, PortError> {
    let InvoiceSnapshot {
        invoice: row,
        line_items,
        payments,
    } = snapshot;
    let currency = parse_currency(&row.currency)?;

    let cancellation = match (row.cancelled_at, row.cancelled_by, row.cancellation_reason) {
        (Some(cancelled_at), Some(cancelled_by), reason) => Some(Cancellation {
            cancelled_at,
            cancelled_by: UserId::from_uuid(cancelled_by),
            reason: reason.unwrap_or_default(),
        }),
        _ => None,
    };

    let invoice = Invoice {
        id: InvoiceId::from_uuid(row.id),
        school_id: SchoolId::from_uuid(row.school_id),
        student_id: StudentId::from_uuid(row.student_id),
        student_name: row.student_name,
        class_id: ClassId::from_uuid(row.class_id),
        invoice_number: row.invoice_number,
        fee_plan: fee_plan_from_db(row.fee_plan),
        period_label: row.period_label,
        period_start: row.period_start,
        period_end: row.period_end,
        issue_date: row.issue_date,
        due_date: row.due_date,
        total_amount: Money::new(row.total_amount, currency),
        line_items: line_items
            .into_iter()
            .map(|item| line_item_from_row(item, currency))
            .collect(),
        status: status_from_db(row.status),
        cancellation,
        created_by: UserId::from_uuid(row.created_by),
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    let payments = payments
        .into_iter()
        .map(payment_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InvoiceLedger::new(invoice, payments))
}

fn line_item_from_row(row: LineItemRow, currency: Currency) -> InvoiceLineItem {
    InvoiceLineItem {
        id: LineItemId::from_uuid(row.id),
        description: row.description,
        amount: Money::new(row.amount, currency),
    }
}

fn payment_from_row(row: PaymentRow) -> Result<Payment, PortError> {
    let currency = parse_currency(&row.currency)?;
    Ok(Payment {
        id: PaymentId::from_uuid(row.id),
        school_id: SchoolId::from_uuid(row.school_id),
        invoice_id: InvoiceId::from_uuid(row.invoice_id),
        student_id: StudentId::from_uuid(row.student_id),
        amount: Money::new(row.amount, currency),
        payment_date: row.payment_date,
        method: payment_method_from_db(row.method),
        reference: row.reference,
        periods_covered: row.periods_covered,
        notes: row.notes,
        recorded_by: UserId::from_uuid(row.recorded_by),
        created_at: row.created_at,
    })
}

pub(crate) fn fee_plan_from_db(plan: FeePlanType) -> FeePlan {
    match plan {
        FeePlanType::Monthly => FeePlan::Monthly,
        FeePlanType::Quarterly => FeePlan::Quarterly,
        FeePlanType::Annual => FeePlan::Annual,
    }
}

fn fee_plan_to_db(plan: FeePlan) -> FeePlanType {
    match plan {
        FeePlan::Monthly => FeePlanType::Monthly,
        FeePlan::Quarterly => FeePlanType::Quarterly,
        FeePlan::Annual => FeePlanType::Annual,
    }
}

fn status_from_db(status: InvoiceStatusType) -> InvoiceStatus {
    match status {
        InvoiceStatusType::Pending => InvoiceStatus::Pending,
        InvoiceStatusType::PartiallyPaid => InvoiceStatus::PartiallyPaid,
        InvoiceStatusType::Paid => InvoiceStatus::Paid,
        InvoiceStatusType::Overdue => InvoiceStatus::Overdue,
        InvoiceStatusType::Cancelled => InvoiceStatus::Cancelled,
    }
}

fn status_to_db(status: InvoiceStatus) -> InvoiceStatusType {
    match status {
        InvoiceStatus::Pending => InvoiceStatusType::Pending,
        InvoiceStatus::PartiallyPaid => InvoiceStatusType::PartiallyPaid,
        InvoiceStatus::Paid => InvoiceStatusType::Paid,
        InvoiceStatus::Overdue => InvoiceStatusType::Overdue,
        InvoiceStatus::Cancelled => InvoiceStatusType::Cancelled,
    }
}

fn payment_method_from_db(method: PaymentMethodType) -> PaymentMethod {
    match method {
        PaymentMethodType::Cash => PaymentMethod::Cash,
        PaymentMethodType::BankTransfer => PaymentMethod::BankTransfer,
        PaymentMethodType::Cheque => PaymentMethod::Cheque,
        PaymentMethodType::Card => PaymentMethod::Card,
        PaymentMethodType::Online => PaymentMethod::Online,
    }
}

fn payment_method_to_db(method: PaymentMethod) -> PaymentMethodType {
    match method {
        PaymentMethod::Cash => PaymentMethodType::Cash,
        PaymentMethod::BankTransfer => PaymentMethodType::BankTransfer,
        PaymentMethod::Cheque => PaymentMethodType::Cheque,
        PaymentMethod::Card => PaymentMethodType::Card,
        PaymentMethod::Online => PaymentMethodType::Online,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_status_mapping_is_bijective(status in prop_oneof![
            Just(InvoiceStatus::Pending),
            Just(InvoiceStatus::PartiallyPaid),
            Just(InvoiceStatus::Paid),
            Just(InvoiceStatus::Overdue),
            Just(InvoiceStatus::Cancelled),
        ]) {
            prop_assert_eq!(status_from_db(status_to_db(status)), status);
        }
    }

    #[test]
    fn test_unknown_currency_is_transformation_error() {
        let err = parse_currency("XYZ").unwrap_err();
        assert!(matches!(err, PortError::Transformation { .. }));
        assert_eq!(parse_currency("pkr").unwrap(), Currency::PKR);
    }

    #[test]
    fn test_method_mapping() {
        for method in [
            PaymentMethod::Cash,
            PaymentMethod::BankTransfer,
            PaymentMethod::Cheque,
            PaymentMethod::Card,
            PaymentMethod::Online,
        ] {
            assert_eq!(payment_method_from_db(payment_method_to_db(method)), method);
        }
    }
}
