//! Payment recording
//!
//! A payment is immutable once stored. Correcting a mistake means deleting
//! the payment and recording a new one; the challan's balance and status
//! are re-derived either way.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{InvoiceId, Money, PaymentId, SchoolId, StudentId, UserId};

use crate::error::BillingError;

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Cheque,
    Card,
    /// Mobile wallet or online banking
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Card => "card",
            PaymentMethod::Online => "online",
        }
    }

    /// Methods that normally carry a bank or gateway reference
    pub fn expects_reference(&self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "cheque" => Ok(PaymentMethod::Cheque),
            "card" => Ok(PaymentMethod::Card),
            "online" => Ok(PaymentMethod::Online),
            other => Err(BillingError::validation(format!("unknown payment method '{other}'"))),
        }
    }
}

/// A recorded payment against one challan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub school_id: SchoolId,
    pub invoice_id: InvoiceId,
    pub student_id: StudentId,
    pub amount: Money,
    /// School-local date the money was received
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    /// Bank or gateway reference
    pub reference: Option<String>,
    /// Month labels the payment is meant to cover
    pub periods_covered: Vec<String>,
    pub notes: Option<String>,
    pub recorded_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Amount in the challan's currency
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    /// Defaults to the months of the challan's period when empty
    #[serde(default)]
    pub periods_covered: Vec<String>,
    /// Defaults to today in the school's timezone
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl PaymentRequest {
    pub fn new(amount: Decimal, method: PaymentMethod) -> Self {
        Self {
            amount,
            method,
            reference: None,
            periods_covered: Vec::new(),
            payment_date: None,
            notes: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_periods(mut self, periods: Vec<String>) -> Self {
        self.periods_covered = periods;
        self
    }

    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.payment_date = Some(date);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks the request in isolation, before any challan is read
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.amount <= Decimal::ZERO {
            return Err(BillingError::validation("payment amount must be positive"));
        }
        if self.amount.round_dp(2) != self.amount {
            return Err(BillingError::validation(
                "payment amount cannot have more than 2 decimal places",
            ));
        }
        if let Some(reference) = &self.reference {
            if reference.trim().is_empty() || reference.len() > 100 {
                return Err(BillingError::validation("payment reference must be 1-100 characters"));
            }
        }
        if self.periods_covered.iter().any(|p| p.trim().is_empty()) {
            return Err(BillingError::validation("periods covered cannot contain blank labels"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_request_validation() {
        assert!(PaymentRequest::new(dec!(1500), PaymentMethod::Cash).validate().is_ok());
        assert!(PaymentRequest::new(dec!(0), PaymentMethod::Cash).validate().is_err());
        assert!(PaymentRequest::new(dec!(-10), PaymentMethod::Cash).validate().is_err());
        assert!(PaymentRequest::new(dec!(10.005), PaymentMethod::Cash).validate().is_err());
        assert!(PaymentRequest::new(dec!(10), PaymentMethod::BankTransfer)
            .with_reference("  ")
            .validate()
            .is_err());
    }

    #[test]
    fn test_method_round_trip_through_str() {
        assert_eq!("bank_transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::BankTransfer);
        assert_eq!(PaymentMethod::Cheque.to_string(), "cheque");
        assert!("barter".parse::<PaymentMethod>().is_err());
        assert!(!PaymentMethod::Cash.expects_reference());
    }
}
