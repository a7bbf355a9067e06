//! Invoice ledgers
//!
//! An [`InvoiceLedger`] is a challan together with every payment recorded
//! against it, read from one consistent snapshot of the store. All balances
//! and reports are projections over ledgers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, MoneyError};

use crate::invoice::{Invoice, InvoiceStatus};
use crate::payment::Payment;
use crate::status::{assess, Assessment};

/// A challan and its payments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLedger {
    pub invoice: Invoice,
    pub payments: Vec<Payment>,
}

impl InvoiceLedger {
    pub fn new(invoice: Invoice, payments: Vec<Payment>) -> Self {
        Self { invoice, payments }
    }

    /// Derives paid amount, balance and status as of `today`
    pub fn assess(&self, today: NaiveDate) -> Result<Assessment, MoneyError> {
        assess(&self.invoice, &self.payments, today)
    }

    /// Builds the read model returned to callers
    pub fn view(self, today: NaiveDate) -> Result<InvoiceView, MoneyError> {
        let assessment = self.assess(today)?;
        Ok(InvoiceView {
            invoice: self.invoice,
            payments: self.payments,
            paid: assessment.paid,
            balance: assessment.balance,
            status: assessment.status,
        })
    }
}

/// A challan with its payments and freshly derived balance and status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceView {
    pub invoice: Invoice,
    pub payments: Vec<Payment>,
    pub paid: Money,
    pub balance: Money,
    pub status: InvoiceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{format_invoice_number, InvoiceDraft};
    use crate::payment::PaymentMethod;
    use crate::period::{resolve_period, FeePlan, FiscalCalendar};
    use crate::student::Student;
    use chrono::Utc;
    use core_kernel::{ClassId, Currency, PaymentId, SchoolId, UserId};
    use rust_decimal_macros::dec;

    fn ledger_with_payments(amounts: &[rust_decimal::Decimal]) -> InvoiceLedger {
        let school = SchoolId::new();
        let student = Student::new(
            school,
            ClassId::new(),
            "Hira Malik",
            FeePlan::Monthly,
            Money::new(dec!(3000), Currency::PKR),
        );
        let period = resolve_period(FeePlan::Monthly, 3, 2025, &FiscalCalendar::default()).unwrap();
        let issue = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let invoice = InvoiceDraft::for_student(&student, period, issue, 10, UserId::new(), true)
            .unwrap()
            .into_invoice(school, format_invoice_number("CH", 2025, 1));

        let payments = amounts
            .iter()
            .map(|amount| Payment {
                id: PaymentId::new(),
                school_id: school,
                invoice_id: invoice.id,
                student_id: student.id,
                amount: Money::new(*amount, Currency::PKR),
                payment_date: issue,
                method: PaymentMethod::Cash,
                reference: None,
                periods_covered: vec!["March 2025".to_string()],
                notes: None,
                recorded_by: UserId::new(),
                created_at: Utc::now(),
            })
            .collect();

        InvoiceLedger::new(invoice, payments)
    }

    #[test]
    fn test_view_derives_balance() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let view = ledger_with_payments(&[dec!(1000), dec!(500)]).view(today).unwrap();
        assert_eq!(view.paid.amount(), dec!(1500));
        assert_eq!(view.balance.amount(), dec!(1500));
        assert_eq!(view.status, InvoiceStatus::PartiallyPaid);
    }

    #[test]
    fn test_unpaid_ledger_turns_overdue() {
        let ledger = ledger_with_payments(&[]);
        let before = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();
        let after = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        assert_eq!(ledger.assess(before).unwrap().status, InvoiceStatus::Pending);
        assert_eq!(ledger.assess(after).unwrap().status, InvoiceStatus::Overdue);
    }
}
