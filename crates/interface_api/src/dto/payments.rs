//! Payment DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{InvoiceId, PaymentId, StudentId, UserId};
use domain_billing::{Payment, PaymentMethod, PaymentQuery, PaymentReceipt, PaymentRequest};

use super::challans::InvoiceResponse;
use super::money;
use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[validate(length(min = 1, max = 100, message = "reference must be 1-100 characters"))]
    pub reference: Option<String>,
    #[serde(default)]
    pub periods_covered: Vec<String>,
    /// Defaults to today in the school's timezone
    pub payment_date: Option<NaiveDate>,
    #[validate(length(max = 500, message = "notes cannot exceed 500 characters"))]
    pub notes: Option<String>,
}

impl RecordPaymentRequest {
    pub fn into_domain(self) -> Result<PaymentRequest, ApiError> {
        self.validate()?;
        Ok(PaymentRequest {
            amount: self.amount,
            method: self.method,
            reference: self.reference,
            periods_covered: self.periods_covered,
            payment_date: self.payment_date,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentListParams {
    pub student_id: Option<StudentId>,
    pub invoice_id: Option<InvoiceId>,
    pub method: Option<PaymentMethod>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl From<PaymentListParams> for PaymentQuery {
    fn from(params: PaymentListParams) -> Self {
        PaymentQuery {
            student_id: params.student_id,
            invoice_id: params.invoice_id,
            method: params.method,
            from: params.from,
            to: params.to,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub student_id: StudentId,
    pub amount: String,
    pub currency: String,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub periods_covered: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub recorded_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            invoice_id: payment.invoice_id,
            student_id: payment.student_id,
            amount: money(&payment.amount),
            currency: payment.amount.currency().code().to_string(),
            payment_date: payment.payment_date,
            method: payment.method,
            reference: payment.reference,
            periods_covered: payment.periods_covered,
            notes: payment.notes,
            recorded_by: payment.recorded_by,
            created_at: payment.created_at,
        }
    }
}

/// The stored payment with the challan as it stands afterwards
#[derive(Debug, Serialize)]
pub struct PaymentReceiptResponse {
    pub payment: PaymentResponse,
    pub invoice: InvoiceResponse,
}

impl From<PaymentReceipt> for PaymentReceiptResponse {
    fn from(receipt: PaymentReceipt) -> Self {
        Self {
            payment: receipt.payment.into(),
            invoice: receipt.invoice.into(),
        }
    }
}
