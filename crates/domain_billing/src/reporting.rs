//! Aggregation and reporting
//!
//! Every report here is a pure projection over invoice ledgers or payments
//! read from the store. Nothing is cached, so collected amounts always
//! reconcile with the payments behind them.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use core_kernel::{ClassId, Currency, Money, MoneyError, StudentId};

use crate::invoice::InvoiceStatus;
use crate::ledger::{InvoiceLedger, InvoiceView};
use crate::payment::{Payment, PaymentMethod};

/// Filters for the defaulter list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaulterFilter {
    pub min_days_overdue: Option<i64>,
    pub class_id: Option<ClassId>,
}

/// A student with unpaid challans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaulterRow {
    pub student_id: StudentId,
    pub student_name: String,
    pub class_id: ClassId,
    /// Challans with a balance
    pub pending_periods: usize,
    pub total_due: Money,
    pub oldest_due_date: NaiveDate,
    /// Days since the oldest unpaid due date, never negative
    pub days_overdue: i64,
}

/// Lists students owing money, most overdue first
///
/// Cancelled challans are ignored. A student's class is taken from their
/// most recent challan.
pub fn defaulters(
    ledgers: &[InvoiceLedger],
    today: NaiveDate,
    filter: &DefaulterFilter,
) -> Result<Vec<DefaulterRow>, MoneyError> {
    let mut rows: HashMap<StudentId, DefaulterRow> = HashMap::new();
    let mut latest_period: HashMap<StudentId, NaiveDate> = HashMap::new();

    for ledger in ledgers {
        let invoice = &ledger.invoice;
        if invoice.is_cancelled() {
            continue;
        }
        let assessment = ledger.assess(today)?;
        if !assessment.balance.is_positive() {
            continue;
        }

        let row = rows.entry(invoice.student_id).or_insert_with(|| DefaulterRow {
            student_id: invoice.student_id,
            student_name: invoice.student_name.clone(),
            class_id: invoice.class_id,
            pending_periods: 0,
            total_due: Money::zero(invoice.currency()),
            oldest_due_date: invoice.due_date,
            days_overdue: 0,
        });
        row.pending_periods += 1;
        row.total_due = row.total_due.checked_add(&assessment.balance)?;
        row.oldest_due_date = row.oldest_due_date.min(invoice.due_date);

        let latest = latest_period.entry(invoice.student_id).or_insert(invoice.period_start);
        if invoice.period_start >= *latest {
            *latest = invoice.period_start;
            row.class_id = invoice.class_id;
            row.student_name = invoice.student_name.clone();
        }
    }

    let mut rows: Vec<DefaulterRow> = rows
        .into_values()
        .map(|mut row| {
            row.days_overdue = (today - row.oldest_due_date).num_days().max(0);
            row
        })
        .filter(|row| filter.class_id.map_or(true, |id| row.class_id == id))
        .filter(|row| filter.min_days_overdue.map_or(true, |min| row.days_overdue >= min))
        .collect();

    rows.sort_by(|a, b| {
        b.days_overdue
            .cmp(&a.days_overdue)
            .then_with(|| b.total_due.amount().cmp(&a.total_due.amount()))
            .then_with(|| a.student_name.cmp(&b.student_name))
    });
    Ok(rows)
}

/// Collection figures for one class in one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSummaryRow {
    pub class_id: ClassId,
    pub class_name: Option<String>,
    pub period_label: String,
    pub students_billed: usize,
    pub paid_students: usize,
    pub partially_paid_students: usize,
    pub pending_students: usize,
    pub overdue_students: usize,
    pub total_amount: Money,
    /// `Σ min(paid, total)`
    pub collected_amount: Money,
    pub remaining_amount: Money,
    /// Rounded to 2 decimal places, 0 when nothing was billed
    pub collection_percentage: Decimal,
}

/// Summarizes collection per class for one period label
///
/// `class_names` supplies display names; classes missing from it still get
/// a row with `class_name: None`.
pub fn class_summary(
    ledgers: &[InvoiceLedger],
    period_label: &str,
    today: NaiveDate,
    class_names: &HashMap<ClassId, String>,
    class_filter: Option<ClassId>,
) -> Result<Vec<ClassSummaryRow>, MoneyError> {
    let mut rows: HashMap<ClassId, ClassSummaryRow> = HashMap::new();

    for ledger in ledgers {
        let invoice = &ledger.invoice;
        if invoice.is_cancelled() || invoice.period_label != period_label {
            continue;
        }
        if class_filter.is_some_and(|id| id != invoice.class_id) {
            continue;
        }

        let assessment = ledger.assess(today)?;
        let currency = invoice.currency();
        let row = rows.entry(invoice.class_id).or_insert_with(|| ClassSummaryRow {
            class_id: invoice.class_id,
            class_name: class_names.get(&invoice.class_id).cloned(),
            period_label: period_label.to_string(),
            students_billed: 0,
            paid_students: 0,
            partially_paid_students: 0,
            pending_students: 0,
            overdue_students: 0,
            total_amount: Money::zero(currency),
            collected_amount: Money::zero(currency),
            remaining_amount: Money::zero(currency),
            collection_percentage: Decimal::ZERO,
        });

        row.students_billed += 1;
        match assessment.status {
            InvoiceStatus::Paid => row.paid_students += 1,
            InvoiceStatus::PartiallyPaid => row.partially_paid_students += 1,
            InvoiceStatus::Pending => row.pending_students += 1,
            InvoiceStatus::Overdue => row.overdue_students += 1,
            InvoiceStatus::Cancelled => {}
        }
        row.total_amount = row.total_amount.checked_add(&invoice.total_amount)?;
        row.collected_amount = row
            .collected_amount
            .checked_add(&assessment.collected(invoice.total_amount))?;
    }

    let mut rows = rows
        .into_values()
        .map(|mut row| {
            row.remaining_amount = row.total_amount.checked_sub(&row.collected_amount)?;
            row.collection_percentage = percentage(row.collected_amount, row.total_amount);
            Ok(row)
        })
        .collect::<Result<Vec<_>, MoneyError>>()?;

    rows.sort_by(|a, b| {
        a.class_name
            .cmp(&b.class_name)
            .then_with(|| a.class_id.cmp(&b.class_id))
    });
    Ok(rows)
}

fn percentage(part: Money, whole: Money) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        (part.amount() / whole.amount() * Decimal::ONE_HUNDRED).round_dp(2)
    }
}

/// One student's challans with running totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentStatement {
    pub student_id: StudentId,
    pub student_name: String,
    pub invoices: Vec<InvoiceView>,
    pub total_billed: Money,
    pub total_paid: Money,
    pub total_outstanding: Money,
}

/// Builds a statement from a student's ledgers, ignoring cancelled challans
pub fn student_statement(
    student_id: StudentId,
    student_name: impl Into<String>,
    currency: Currency,
    ledgers: Vec<InvoiceLedger>,
    today: NaiveDate,
) -> Result<StudentStatement, MoneyError> {
    let mut total_billed = Money::zero(currency);
    let mut total_paid = Money::zero(currency);
    let mut invoices = Vec::new();

    for ledger in ledgers {
        if ledger.invoice.student_id != student_id || ledger.invoice.is_cancelled() {
            continue;
        }
        let view = ledger.view(today)?;
        total_billed = total_billed.checked_add(&view.invoice.total_amount)?;
        total_paid = total_paid.checked_add(&view.paid)?;
        invoices.push(view);
    }

    Ok(StudentStatement {
        student_id,
        student_name: student_name.into(),
        invoices,
        total_outstanding: total_billed.checked_sub(&total_paid)?,
        total_billed,
        total_paid,
    })
}

/// Payments received through one method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRow {
    pub method: PaymentMethod,
    pub payment_count: usize,
    pub total: Money,
}

/// Payments received in a date range, grouped by method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub rows: Vec<CollectionRow>,
    pub payment_count: usize,
    pub grand_total: Money,
}

/// Groups payments dated within `[from, to]` by method
pub fn collection_report(
    payments: &[Payment],
    from: NaiveDate,
    to: NaiveDate,
    currency: Currency,
) -> Result<CollectionReport, MoneyError> {
    let mut by_method: BTreeMap<PaymentMethod, CollectionRow> = BTreeMap::new();
    let mut grand_total = Money::zero(currency);
    let mut payment_count = 0;

    for payment in payments
        .iter()
        .filter(|p| p.payment_date >= from && p.payment_date <= to)
    {
        let row = by_method.entry(payment.method).or_insert_with(|| CollectionRow {
            method: payment.method,
            payment_count: 0,
            total: Money::zero(currency),
        });
        row.payment_count += 1;
        row.total = row.total.checked_add(&payment.amount)?;
        grand_total = grand_total.checked_add(&payment.amount)?;
        payment_count += 1;
    }

    Ok(CollectionReport {
        from,
        to,
        rows: by_method.into_values().collect(),
        payment_count,
        grand_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{format_invoice_number, Invoice, InvoiceDraft};
    use crate::period::{resolve_period, FeePlan, FiscalCalendar};
    use crate::student::Student;
    use chrono::Utc;
    use core_kernel::{PaymentId, SchoolId, UserId};
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn invoice(student: &Student, month: u32, seq: i64) -> Invoice {
        let period = resolve_period(FeePlan::Monthly, month, 2025, &FiscalCalendar::default()).unwrap();
        InvoiceDraft::for_student(student, period, date(month, 1), 10, UserId::new(), true)
            .unwrap()
            .into_invoice(student.school_id, format_invoice_number("CH", 2025, seq))
    }

    fn pay(invoice: &Invoice, amount: Decimal, method: PaymentMethod, on: NaiveDate) -> Payment {
        Payment {
            id: PaymentId::new_v7(),
            school_id: invoice.school_id,
            invoice_id: invoice.id,
            student_id: invoice.student_id,
            amount: Money::new(amount, Currency::PKR),
            payment_date: on,
            method,
            reference: None,
            periods_covered: vec![invoice.period_label.clone()],
            notes: None,
            recorded_by: UserId::new(),
            created_at: Utc::now(),
        }
    }

    fn student(school: SchoolId, class_id: ClassId, name: &str) -> Student {
        Student::new(school, class_id, name, FeePlan::Monthly, Money::new(dec!(3000), Currency::PKR))
    }

    #[test]
    fn test_defaulters_aggregate_per_student() {
        let school = SchoolId::new();
        let class_id = ClassId::new();
        let late = student(school, class_id, "Late Payer");
        let paid_up = student(school, class_id, "Paid Up");

        let jan = invoice(&late, 1, 1);
        let feb = invoice(&late, 2, 2);
        let feb_partial = pay(&feb, dec!(1000), PaymentMethod::Cash, date(2, 5));
        let other = invoice(&paid_up, 2, 3);
        let other_paid = pay(&other, dec!(3000), PaymentMethod::Cash, date(2, 5));

        let ledgers = vec![
            InvoiceLedger::new(jan, vec![]),
            InvoiceLedger::new(feb, vec![feb_partial]),
            InvoiceLedger::new(other, vec![other_paid]),
        ];

        let today = date(3, 1);
        let rows = defaulters(&ledgers, today, &DefaulterFilter::default()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.student_id, late.id);
        assert_eq!(row.pending_periods, 2);
        assert_eq!(row.total_due.amount(), dec!(5000));
        assert_eq!(row.oldest_due_date, date(1, 11));
        assert_eq!(row.days_overdue, 49);

        let strict = DefaulterFilter {
            min_days_overdue: Some(60),
            ..Default::default()
        };
        assert!(defaulters(&ledgers, today, &strict).unwrap().is_empty());
    }

    #[test]
    fn test_days_overdue_floored_at_zero() {
        let s = student(SchoolId::new(), ClassId::new(), "Early");
        let ledgers = vec![InvoiceLedger::new(invoice(&s, 3, 1), vec![])];
        let rows = defaulters(&ledgers, date(3, 2), &DefaulterFilter::default()).unwrap();
        assert_eq!(rows[0].days_overdue, 0);
    }

    #[test]
    fn test_class_summary_counts_and_percentage() {
        let school = SchoolId::new();
        let class_id = ClassId::new();
        let a = student(school, class_id, "A");
        let b = student(school, class_id, "B");
        let c = student(school, class_id, "C");

        let ia = invoice(&a, 3, 1);
        let ib = invoice(&b, 3, 2);
        let ic = invoice(&c, 3, 3);
        let pa = pay(&ia, dec!(3000), PaymentMethod::Cash, date(3, 2));
        let pb = pay(&ib, dec!(1500), PaymentMethod::Card, date(3, 3));

        let ledgers = vec![
            InvoiceLedger::new(ia, vec![pa]),
            InvoiceLedger::new(ib, vec![pb]),
            InvoiceLedger::new(ic, vec![]),
        ];
        let names = HashMap::from([(class_id, "Grade 5-A".to_string())]);

        let rows = class_summary(&ledgers, "March 2025", date(3, 20), &names, None).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.class_name.as_deref(), Some("Grade 5-A"));
        assert_eq!(row.students_billed, 3);
        assert_eq!(row.paid_students, 1);
        assert_eq!(row.partially_paid_students, 1);
        assert_eq!(row.overdue_students, 1);
        assert_eq!(row.total_amount.amount(), dec!(9000));
        assert_eq!(row.collected_amount.amount(), dec!(4500));
        assert_eq!(row.remaining_amount.amount(), dec!(4500));
        assert_eq!(row.collection_percentage, dec!(50));

        assert!(class_summary(&ledgers, "April 2025", date(3, 20), &names, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_collection_report_groups_by_method() {
        let s = student(SchoolId::new(), ClassId::new(), "Payer");
        let inv = invoice(&s, 3, 1);
        let payments = vec![
            pay(&inv, dec!(500), PaymentMethod::Cash, date(3, 2)),
            pay(&inv, dec!(700), PaymentMethod::Cash, date(3, 4)),
            pay(&inv, dec!(800), PaymentMethod::Online, date(3, 5)),
            pay(&inv, dec!(100), PaymentMethod::Card, date(4, 1)),
        ];

        let report = collection_report(&payments, date(3, 1), date(3, 31), Currency::PKR).unwrap();
        assert_eq!(report.payment_count, 3);
        assert_eq!(report.grand_total.amount(), dec!(2000));
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].method, PaymentMethod::Cash);
        assert_eq!(report.rows[0].total.amount(), dec!(1200));
    }

    #[test]
    fn test_statement_totals() {
        let s = student(SchoolId::new(), ClassId::new(), "Statement");
        let jan = invoice(&s, 1, 1);
        let feb = invoice(&s, 2, 2);
        let paid = pay(&jan, dec!(3000), PaymentMethod::BankTransfer, date(1, 3));
        let ledgers = vec![InvoiceLedger::new(jan, vec![paid]), InvoiceLedger::new(feb, vec![])];

        let statement = student_statement(s.id, &s.name, Currency::PKR, ledgers, date(2, 20)).unwrap();
        assert_eq!(statement.invoices.len(), 2);
        assert_eq!(statement.total_billed.amount(), dec!(6000));
        assert_eq!(statement.total_paid.amount(), dec!(3000));
        assert_eq!(statement.total_outstanding.amount(), dec!(3000));
        assert_eq!(statement.invoices[1].status, InvoiceStatus::Overdue);
    }
}
