//! Billing repository implementation
//!
//! This module provides database access for challans, their line items and
//! payments. All payment-affecting writes lock the challan row and re-sum its
//! payments inside the same transaction, so a stale caller gets
//! `DatabaseError::Conflict` instead of overpaying the challan.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use domain_billing::format_invoice_number;

use crate::error::DatabaseError;

const INVOICE_COLUMNS: &str = r#"
    id, school_id, student_id, student_name, class_id, invoice_number,
    fee_plan, period_label, period_start, period_end, issue_date, due_date,
    total_amount, currency, status, cancelled_at, cancelled_by,
    cancellation_reason, created_by, created_at, updated_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, school_id, invoice_id, student_id, amount, currency, payment_date,
    method, reference, periods_covered, notes, recorded_by, created_at
"#;

/// Repository for challans and payments
#[derive(Debug, Clone)]
pub struct BillingRepository {
    pool: PgPool,
}

impl BillingRepository {
    /// Creates a new BillingRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Finds open challans for `(student, period)` slots
    ///
    /// `student_ids` and `period_labels` are zipped pairwise.
    pub async fn find_open_invoices(
        &self,
        school_id: Uuid,
        student_ids: &[Uuid],
        period_labels: &[String],
    ) -> Result<Vec<OpenInvoiceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, OpenInvoiceRow>(
            r#"
            SELECT i.student_id, i.period_label, i.invoice_number
            FROM invoices i
            JOIN UNNEST($2::uuid[], $3::text[]) AS k (student_id, period_label)
              ON i.student_id = k.student_id AND i.period_label = k.period_label
            WHERE i.school_id = $1 AND i.status <> 'cancelled'
            "#,
        )
        .bind(school_id)
        .bind(student_ids)
        .bind(period_labels)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Numbers and inserts a batch of challans in a single transaction
    ///
    /// A challan whose slot already has an open challan is skipped by the
    /// partial unique index and reported with the existing number. Its
    /// sequence value is not reused, so numbers may have gaps.
    ///
    /// # Returns
    ///
    /// One result per input, in input order
    pub async fn insert_invoices(
        &self,
        school_id: Uuid,
        number_prefix: &str,
        invoices: Vec<NewInvoice>,
    ) -> Result<Vec<InsertedInvoice>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(invoices.len());

        for invoice in invoices {
            let year = invoice.issue_date_year();
            let sequence: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO invoice_sequences (school_id, year, next_value)
                VALUES ($1, $2, 1)
                ON CONFLICT (school_id, year)
                DO UPDATE SET next_value = invoice_sequences.next_value + 1
                RETURNING next_value
                "#,
            )
            .bind(school_id)
            .bind(year)
            .fetch_one(&mut *tx)
            .await?;
            let invoice_number = format_invoice_number(number_prefix, year, sequence);

            let inserted: Option<Uuid> = sqlx::query_scalar(
                r#"
                INSERT INTO invoices (
                    id, school_id, student_id, student_name, class_id, invoice_number,
                    fee_plan, period_label, period_start, period_end, issue_date, due_date,
                    total_amount, currency, status, created_by, created_at, updated_at
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    'pending', $15, $16, $16
                )
                ON CONFLICT (school_id, student_id, period_label) WHERE status <> 'cancelled'
                DO NOTHING
                RETURNING id
                "#,
            )
            .bind(invoice.id)
            .bind(school_id)
            .bind(invoice.student_id)
            .bind(&invoice.student_name)
            .bind(invoice.class_id)
            .bind(&invoice_number)
            .bind(invoice.fee_plan)
            .bind(&invoice.period_label)
            .bind(invoice.period_start)
            .bind(invoice.period_end)
            .bind(invoice.issue_date)
            .bind(invoice.due_date)
            .bind(invoice.total_amount)
            .bind(&invoice.currency)
            .bind(invoice.created_by)
            .bind(invoice.created_at)
            .fetch_optional(&mut *tx)
            .await?;

            if inserted.is_none() {
                let existing: String = sqlx::query_scalar(
                    r#"
                    SELECT invoice_number FROM invoices
                    WHERE school_id = $1 AND student_id = $2 AND period_label = $3
                      AND status <> 'cancelled'
                    "#,
                )
                .bind(school_id)
                .bind(invoice.student_id)
                .bind(&invoice.period_label)
                .fetch_one(&mut *tx)
                .await?;
                debug!(student_id = %invoice.student_id, period = %invoice.period_label, "Slot already billed");
                results.push(InsertedInvoice::AlreadyBilled {
                    invoice_number: existing,
                });
                continue;
            }

            for (position, item) in invoice.line_items.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO invoice_line_items (id, invoice_id, position, description, amount)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(item.id)
                .bind(invoice.id)
                .bind(position as i32)
                .bind(&item.description)
                .bind(item.amount)
                .execute(&mut *tx)
                .await?;
            }

            results.push(InsertedInvoice::Created { invoice_number });
        }

        tx.commit().await?;
        Ok(results)
    }

    /// Reads one challan with its line items and payments
    pub async fn get_invoice(
        &self,
        school_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceSnapshot>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        begin_snapshot(&mut tx).await?;

        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE school_id = $1 AND id = $2"
        ))
        .bind(school_id)
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await?;

        let snapshot = match row {
            Some(row) => attach_children(&mut tx, vec![row]).await?.pop(),
            None => None,
        };
        tx.commit().await?;
        Ok(snapshot)
    }

    /// Reads challans matching `filter` with their line items and payments
    ///
    /// Ordered by period start, then challan number.
    pub async fn list_invoices(
        &self,
        school_id: Uuid,
        filter: &InvoiceFilter,
    ) -> Result<Vec<InvoiceSnapshot>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        begin_snapshot(&mut tx).await?;

        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM invoices
            WHERE school_id = $1
              AND ($2::uuid IS NULL OR class_id = $2)
              AND ($3::uuid IS NULL OR student_id = $3)
              AND ($4::text IS NULL OR period_label = $4)
              AND ($5 OR status <> 'cancelled')
            ORDER BY period_start, invoice_number
            "#
        ))
        .bind(school_id)
        .bind(filter.class_id)
        .bind(filter.student_id)
        .bind(filter.period_label.as_deref())
        .bind(filter.include_cancelled)
        .fetch_all(&mut *tx)
        .await?;

        let snapshots = attach_children(&mut tx, rows).await?;
        tx.commit().await?;
        Ok(snapshots)
    }

    pub async fn get_payment(
        &self,
        school_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<PaymentRow>, DatabaseError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE school_id = $1 AND id = $2"
        ))
        .bind(school_id)
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Lists payments ordered by payment date, then creation time
    pub async fn list_payments(
        &self,
        school_id: Uuid,
        filter: &PaymentFilter,
    ) -> Result<Vec<PaymentRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE school_id = $1
              AND ($2::uuid IS NULL OR student_id = $2)
              AND ($3::uuid IS NULL OR invoice_id = $3)
              AND ($4::payment_method IS NULL OR method = $4)
              AND ($5::date IS NULL OR payment_date >= $5)
              AND ($6::date IS NULL OR payment_date <= $6)
            ORDER BY payment_date, created_at
            "#
        ))
        .bind(school_id)
        .bind(filter.student_id)
        .bind(filter.invoice_id)
        .bind(filter.method)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Inserts a payment if the challan's payment total is still `expected_paid`
    ///
    /// # Errors
    ///
    /// * `DatabaseError::NotFound` - no such challan in the school
    /// * `DatabaseError::Conflict` - the challan is cancelled or the total moved
    pub async fn append_payment(
        &self,
        payment: NewPayment,
        expected_paid: Decimal,
        status: InvoiceStatusType,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let locked = lock_invoice(&mut tx, payment.school_id, payment.invoice_id).await?;
        if locked.status == InvoiceStatusType::Cancelled {
            return Err(DatabaseError::conflict(format!(
                "invoice {} is cancelled",
                payment.invoice_id
            )));
        }
        expect_paid(&mut tx, payment.invoice_id, expected_paid).await?;

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, school_id, invoice_id, student_id, amount, currency, payment_date,
                method, reference, periods_covered, notes, recorded_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(payment.id)
        .bind(payment.school_id)
        .bind(payment.invoice_id)
        .bind(payment.student_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.payment_date)
        .bind(payment.method)
        .bind(&payment.reference)
        .bind(&payment.periods_covered)
        .bind(&payment.notes)
        .bind(payment.recorded_by)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        set_status(&mut tx, payment.invoice_id, status).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes a payment if its challan's payment total is still `expected_paid`
    pub async fn remove_payment(
        &self,
        school_id: Uuid,
        payment_id: Uuid,
        expected_paid: Decimal,
        status: InvoiceStatusType,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let invoice_id: Uuid =
            sqlx::query_scalar("SELECT invoice_id FROM payments WHERE school_id = $1 AND id = $2")
                .bind(school_id)
                .bind(payment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DatabaseError::not_found("Payment", payment_id))?;

        lock_invoice(&mut tx, school_id, invoice_id).await?;
        expect_paid(&mut tx, invoice_id, expected_paid).await?;

        sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(payment_id)
            .execute(&mut *tx)
            .await?;

        set_status(&mut tx, invoice_id, status).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Soft-cancels a challan if its payment total is still `expected_paid`
    pub async fn cancel_invoice(
        &self,
        school_id: Uuid,
        invoice_id: Uuid,
        cancellation: &NewCancellation,
        expected_paid: Decimal,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let locked = lock_invoice(&mut tx, school_id, invoice_id).await?;
        if locked.status == InvoiceStatusType::Cancelled {
            return Err(DatabaseError::conflict(format!("invoice {invoice_id} is already cancelled")));
        }
        expect_paid(&mut tx, invoice_id, expected_paid).await?;

        sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'cancelled', cancelled_at = $2, cancelled_by = $3,
                cancellation_reason = $4, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(invoice_id)
        .bind(cancellation.cancelled_at)
        .bind(cancellation.cancelled_by)
        .bind(&cancellation.reason)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Deletes a challan with no payments; line items cascade
    pub async fn delete_invoice(&self, school_id: Uuid, invoice_id: Uuid) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        lock_invoice(&mut tx, school_id, invoice_id).await?;
        let has_payments: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payments WHERE invoice_id = $1)")
                .bind(invoice_id)
                .fetch_one(&mut *tx)
                .await?;
        if has_payments {
            return Err(DatabaseError::conflict(format!("invoice {invoice_id} has payments")));
        }

        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Makes the rest of the transaction read from one snapshot
async fn begin_snapshot(conn: &mut PgConnection) -> Result<(), DatabaseError> {
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(conn)
        .await?;
    Ok(())
}

async fn attach_children(
    conn: &mut PgConnection,
    invoices: Vec<InvoiceRow>,
) -> Result<Vec<InvoiceSnapshot>, DatabaseError> {
    if invoices.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = invoices.iter().map(|i| i.id).collect();

    let line_items = sqlx::query_as::<_, LineItemRow>(
        r#"
        SELECT id, invoice_id, position, description, amount
        FROM invoice_line_items
        WHERE invoice_id = ANY($1)
        ORDER BY invoice_id, position
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let payments = sqlx::query_as::<_, PaymentRow>(&format!(
        r#"
        SELECT {PAYMENT_COLUMNS} FROM payments
        WHERE invoice_id = ANY($1)
        ORDER BY payment_date, created_at
        "#
    ))
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items_by_invoice: HashMap<Uuid, Vec<LineItemRow>> = HashMap::new();
    for item in line_items {
        items_by_invoice.entry(item.invoice_id).or_default().push(item);
    }
    let mut payments_by_invoice: HashMap<Uuid, Vec<PaymentRow>> = HashMap::new();
    for payment in payments {
        payments_by_invoice.entry(payment.invoice_id).or_default().push(payment);
    }

    Ok(invoices
        .into_iter()
        .map(|invoice| InvoiceSnapshot {
            line_items: items_by_invoice.remove(&invoice.id).unwrap_or_default(),
            payments: payments_by_invoice.remove(&invoice.id).unwrap_or_default(),
            invoice,
        })
        .collect())
}

async fn lock_invoice(
    conn: &mut PgConnection,
    school_id: Uuid,
    invoice_id: Uuid,
) -> Result<LockedInvoice, DatabaseError> {
    sqlx::query_as::<_, LockedInvoice>(
        "SELECT status FROM invoices WHERE school_id = $1 AND id = $2 FOR UPDATE",
    )
    .bind(school_id)
    .bind(invoice_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Invoice", invoice_id))
}

async fn expect_paid(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    expected: Decimal,
) -> Result<(), DatabaseError> {
    let actual: Decimal =
        sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1")
            .bind(invoice_id)
            .fetch_one(conn)
            .await?;
    if actual != expected {
        return Err(DatabaseError::conflict(format!(
            "payment total on invoice {invoice_id} is {actual}, expected {expected}"
        )));
    }
    Ok(())
}

async fn set_status(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    status: InvoiceStatusType,
) -> Result<(), DatabaseError> {
    sqlx::query("UPDATE invoices SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(invoice_id)
        .bind(status)
        .execute(conn)
        .await?;
    Ok(())
}

/// Fee plan column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "fee_plan", rename_all = "snake_case")]
pub enum FeePlanType {
    Monthly,
    Quarterly,
    Annual,
}

/// Challan status column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
pub enum InvoiceStatusType {
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
    Cancelled,
}

/// Payment method column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
pub enum PaymentMethodType {
    Cash,
    BankTransfer,
    Cheque,
    Card,
    Online,
}

/// Database row for a challan
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub school_id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub class_id: Uuid,
    pub invoice_number: String,
    pub fee_plan: FeePlanType,
    pub period_label: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: Decimal,
    pub currency: String,
    pub status: InvoiceStatusType,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for a challan line item
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LineItemRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub position: i32,
    pub description: String,
    pub amount: Decimal,
}

/// Database row for a payment
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub school_id: Uuid,
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_date: NaiveDate,
    pub method: PaymentMethodType,
    pub reference: Option<String>,
    pub periods_covered: Vec<String>,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// An open challan occupying a `(student, period)` slot
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OpenInvoiceRow {
    pub student_id: Uuid,
    pub period_label: String,
    pub invoice_number: String,
}

#[derive(Debug, Clone, Copy, sqlx::FromRow)]
struct LockedInvoice {
    status: InvoiceStatusType,
}

/// A challan with everything needed to derive its balance
#[derive(Debug, Clone)]
pub struct InvoiceSnapshot {
    pub invoice: InvoiceRow,
    pub line_items: Vec<LineItemRow>,
    pub payments: Vec<PaymentRow>,
}

/// Filters for listing challans
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub class_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub period_label: Option<String>,
    pub include_cancelled: bool,
}

/// Filters for listing payments
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub student_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub method: Option<PaymentMethodType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Data for creating a new challan
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub class_id: Uuid,
    pub fee_plan: FeePlanType,
    pub period_label: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: Decimal,
    pub currency: String,
    pub line_items: Vec<NewLineItem>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl NewInvoice {
    fn issue_date_year(&self) -> i32 {
        chrono::Datelike::year(&self.issue_date)
    }
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub id: Uuid,
    pub description: String,
    pub amount: Decimal,
}

/// Data for recording a payment
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: Uuid,
    pub school_id: Uuid,
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_date: NaiveDate,
    pub method: PaymentMethodType,
    pub reference: Option<String>,
    pub periods_covered: Vec<String>,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCancellation {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: Uuid,
    pub reason: String,
}

/// Result of inserting one challan of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertedInvoice {
    Created { invoice_number: String },
    AlreadyBilled { invoice_number: String },
}
