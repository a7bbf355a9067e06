//! Report, statement and period DTOs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{ClassId, StudentId};
use domain_billing::{
    BillingPeriod, ClassSummaryRow, CollectionReport, DefaulterFilter, DefaulterRow, FeePlan,
    PaymentMethod, StudentStatement,
};

use super::challans::InvoiceResponse;
use super::{amount, money};

#[derive(Debug, Default, Deserialize)]
pub struct DefaulterParams {
    pub min_days_overdue: Option<i64>,
    pub class_id: Option<ClassId>,
}

impl From<DefaulterParams> for DefaulterFilter {
    fn from(params: DefaulterParams) -> Self {
        DefaulterFilter {
            min_days_overdue: params.min_days_overdue,
            class_id: params.class_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DefaulterResponse {
    pub student_id: StudentId,
    pub student_name: String,
    pub class_id: ClassId,
    pub pending_periods: usize,
    pub total_due: String,
    pub oldest_due_date: NaiveDate,
    pub days_overdue: i64,
}

impl From<DefaulterRow> for DefaulterResponse {
    fn from(row: DefaulterRow) -> Self {
        Self {
            student_id: row.student_id,
            student_name: row.student_name,
            class_id: row.class_id,
            pending_periods: row.pending_periods,
            total_due: money(&row.total_due),
            oldest_due_date: row.oldest_due_date,
            days_overdue: row.days_overdue,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ClassSummaryParams {
    pub period: String,
    pub class_id: Option<ClassId>,
}

#[derive(Debug, Serialize)]
pub struct ClassSummaryResponse {
    pub class_id: ClassId,
    pub class_name: Option<String>,
    pub period_label: String,
    pub students_billed: usize,
    pub paid_students: usize,
    pub partially_paid_students: usize,
    pub pending_students: usize,
    pub overdue_students: usize,
    pub total_amount: String,
    pub collected_amount: String,
    pub remaining_amount: String,
    pub collection_percentage: String,
}

impl From<ClassSummaryRow> for ClassSummaryResponse {
    fn from(row: ClassSummaryRow) -> Self {
        Self {
            class_id: row.class_id,
            class_name: row.class_name,
            period_label: row.period_label,
            students_billed: row.students_billed,
            paid_students: row.paid_students,
            partially_paid_students: row.partially_paid_students,
            pending_students: row.pending_students,
            overdue_students: row.overdue_students,
            total_amount: money(&row.total_amount),
            collected_amount: money(&row.collected_amount),
            remaining_amount: money(&row.remaining_amount),
            collection_percentage: amount(row.collection_percentage),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CollectionParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct CollectionRowResponse {
    pub method: PaymentMethod,
    pub payment_count: usize,
    pub total: String,
}

#[derive(Debug, Serialize)]
pub struct CollectionReportResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub rows: Vec<CollectionRowResponse>,
    pub payment_count: usize,
    pub grand_total: String,
}

impl From<CollectionReport> for CollectionReportResponse {
    fn from(report: CollectionReport) -> Self {
        Self {
            from: report.from,
            to: report.to,
            rows: report
                .rows
                .into_iter()
                .map(|row| CollectionRowResponse {
                    method: row.method,
                    payment_count: row.payment_count,
                    total: money(&row.total),
                })
                .collect(),
            payment_count: report.payment_count,
            grand_total: money(&report.grand_total),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StudentStatementResponse {
    pub student_id: StudentId,
    pub student_name: String,
    pub invoices: Vec<InvoiceResponse>,
    pub total_billed: String,
    pub total_paid: String,
    pub total_outstanding: String,
}

impl From<StudentStatement> for StudentStatementResponse {
    fn from(statement: StudentStatement) -> Self {
        Self {
            student_id: statement.student_id,
            student_name: statement.student_name,
            total_billed: money(&statement.total_billed),
            total_paid: money(&statement.total_paid),
            total_outstanding: money(&statement.total_outstanding),
            invoices: statement.invoices.into_iter().map(InvoiceResponse::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolvePeriodParams {
    pub plan: String,
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Serialize)]
pub struct PeriodResponse {
    pub plan: FeePlan,
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Month labels a payment for this period covers by default
    pub months: Vec<String>,
}

impl From<BillingPeriod> for PeriodResponse {
    fn from(period: BillingPeriod) -> Self {
        Self {
            months: period.month_labels(),
            plan: period.plan,
            label: period.label,
            start: period.start,
            end: period.end,
        }
    }
}
