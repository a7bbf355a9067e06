//! Fee challans
//!
//! A challan (fee invoice) bills one student for one period. Its total and
//! line items are fixed at issue; payments are recorded separately and the
//! paid amount, balance and status are always derived from them.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    ClassId, Currency, InvoiceId, LineItemId, Money, MoneyError, SchoolId, StudentId, UserId,
};

use crate::error::BillingError;
use crate::period::{BillingPeriod, FeePlan};
use crate::student::Student;

/// Longest due window accepted when issuing challans
pub const MAX_DUE_IN_DAYS: u32 = 365;

/// Challan status
///
/// Every status other than `Cancelled` is a function of the payments and
/// the due date, see [`crate::status::derive_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Nothing paid, not yet due
    Pending,
    /// Some but not all of the total paid
    PartiallyPaid,
    /// Fully paid
    Paid,
    /// Unpaid balance past the due date
    Overdue,
    /// Voided by staff
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if money is still expected on the challan
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Pending | InvoiceStatus::PartiallyPaid | InvoiceStatus::Overdue
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvoiceStatus::Pending),
            "partially_paid" => Ok(InvoiceStatus::PartiallyPaid),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(BillingError::validation(format!("unknown invoice status '{other}'"))),
        }
    }
}

/// One component of a challan total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub id: LineItemId,
    pub description: String,
    /// Negative for discounts
    pub amount: Money,
}

impl InvoiceLineItem {
    pub fn new(description: impl Into<String>, amount: Money) -> Self {
        Self {
            id: LineItemId::new_v7(),
            description: description.into(),
            amount,
        }
    }
}

/// Who voided a challan, when and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: UserId,
    pub reason: String,
}

/// A fee challan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub school_id: SchoolId,
    pub student_id: StudentId,
    /// Student name at issue
    pub student_name: String,
    /// Class at issue
    pub class_id: ClassId,
    /// `{prefix}-{year}-{sequence}`, unique per school
    pub invoice_number: String,
    pub fee_plan: FeePlan,
    pub period_label: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: Money,
    pub line_items: Vec<InvoiceLineItem>,
    /// Last status written by a mutation; readers re-derive it
    pub status: InvoiceStatus,
    pub cancellation: Option<Cancellation>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn currency(&self) -> Currency {
        self.total_amount.currency()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == InvoiceStatus::Cancelled
    }

    /// The billing period the challan covers
    pub fn period(&self) -> BillingPeriod {
        BillingPeriod {
            plan: self.fee_plan,
            label: self.period_label.clone(),
            start: self.period_start,
            end: self.period_end,
        }
    }

    /// Sum of the line item amounts
    pub fn line_items_total(&self) -> Result<Money, MoneyError> {
        Money::sum(self.currency(), self.line_items.iter().map(|item| &item.amount))
    }
}

/// A challan built for a student and period, not yet numbered or stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub id: InvoiceId,
    pub student_id: StudentId,
    pub student_name: String,
    pub class_id: ClassId,
    pub period: BillingPeriod,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: Money,
    pub line_items: Vec<InvoiceLineItem>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl InvoiceDraft {
    /// Builds the challan a student owes for a period
    ///
    /// # Arguments
    ///
    /// * `student` - Student being billed
    /// * `period` - Period resolved from the student's fee plan
    /// * `issue_date` - School-local issue date
    /// * `due_in_days` - Days between issue and due date
    /// * `created_by` - Staff member issuing the challan
    /// * `itemize_discount` - Emit separate base fee and discount lines
    pub fn for_student(
        student: &Student,
        period: BillingPeriod,
        issue_date: NaiveDate,
        due_in_days: u32,
        created_by: UserId,
        itemize_discount: bool,
    ) -> Result<Self, BillingError> {
        let total = student.final_fee()?;
        let due_date = issue_date
            .checked_add_days(Days::new(u64::from(due_in_days)))
            .ok_or_else(|| BillingError::validation("due date out of range"))?;

        let discount = student.discount();
        let line_items = if itemize_discount && !discount.is_zero() {
            vec![
                InvoiceLineItem::new(
                    format!("Tuition fee - {}", period.label),
                    student.base_fee.round_to_currency(),
                ),
                InvoiceLineItem::new(
                    format!("Discount ({})", student.discount_rate()),
                    -discount,
                ),
            ]
        } else {
            vec![InvoiceLineItem::new(format!("Tuition fee - {}", period.label), total)]
        };

        Ok(Self {
            id: InvoiceId::new_v7(),
            student_id: student.id,
            student_name: student.name.clone(),
            class_id: student.class_id,
            period,
            issue_date,
            due_date,
            total_amount: total,
            line_items,
            created_by,
            created_at: Utc::now(),
        })
    }

    /// Returns the year used in the challan number
    pub fn number_year(&self) -> i32 {
        chrono::Datelike::year(&self.issue_date)
    }

    /// Turns the draft into a stored challan with its assigned number
    pub fn into_invoice(self, school_id: SchoolId, invoice_number: String) -> Invoice {
        Invoice {
            id: self.id,
            school_id,
            student_id: self.student_id,
            student_name: self.student_name,
            class_id: self.class_id,
            invoice_number,
            fee_plan: self.period.plan,
            period_label: self.period.label,
            period_start: self.period.start,
            period_end: self.period.end,
            issue_date: self.issue_date,
            due_date: self.due_date,
            total_amount: self.total_amount,
            line_items: self.line_items,
            status: InvoiceStatus::Pending,
            cancellation: None,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Formats a challan number, e.g. `CH-2025-000042`
pub fn format_invoice_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{prefix}-{year}-{sequence:06}")
}
