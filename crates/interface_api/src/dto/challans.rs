//! Challan DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{ClassId, InvoiceId, StudentId, UserId};
use domain_billing::{
    FeePlan, GenerationReport, GenerationRequest, InvoiceQuery, InvoiceStatus, InvoiceView,
    SkippedStudent,
};

use super::money;
use super::payments::PaymentResponse;
use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateChallansRequest {
    pub class_id: Option<ClassId>,
    pub student_id: Option<StudentId>,
    #[validate(range(min = 1, max = 12, message = "month must be 1-12"))]
    pub month: u32,
    #[validate(range(min = 2000, max = 2200, message = "year must be 2000-2200"))]
    pub year: i32,
    #[validate(range(max = 365, message = "due_in_days cannot exceed 365"))]
    pub due_in_days: Option<u32>,
}

impl GenerateChallansRequest {
    /// Validates the body and picks the target; exactly one of class or student is required
    pub fn into_domain(self) -> Result<GenerationRequest, ApiError> {
        self.validate()?;
        let request = match (self.class_id, self.student_id) {
            (Some(class_id), None) => GenerationRequest::for_class(class_id, self.month, self.year),
            (None, Some(student_id)) => {
                GenerationRequest::for_student(student_id, self.month, self.year)
            }
            _ => {
                return Err(ApiError::Validation(
                    "exactly one of class_id or student_id is required".to_string(),
                ))
            }
        };
        Ok(match self.due_in_days {
            Some(days) => request.due_in(days),
            None => request,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelInvoiceRequest {
    #[validate(length(min = 1, max = 500, message = "reason must be 1-500 characters"))]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListParams {
    pub class_id: Option<ClassId>,
    pub student_id: Option<StudentId>,
    pub period: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub include_cancelled: Option<bool>,
}

impl From<InvoiceListParams> for InvoiceQuery {
    fn from(params: InvoiceListParams) -> Self {
        InvoiceQuery {
            class_id: params.class_id,
            student_id: params.student_id,
            period_label: params.period,
            status: params.status,
            include_cancelled: params.include_cancelled.unwrap_or(false),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LineItemResponse {
    pub description: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct CancellationResponse {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: UserId,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub student_id: StudentId,
    pub student_name: String,
    pub class_id: ClassId,
    pub fee_plan: FeePlan,
    pub period_label: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub total_amount: String,
    pub paid_amount: String,
    pub balance: String,
    pub status: InvoiceStatus,
    pub line_items: Vec<LineItemResponse>,
    pub payments: Vec<PaymentResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<CancellationResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<InvoiceView> for InvoiceResponse {
    fn from(view: InvoiceView) -> Self {
        let invoice = view.invoice;
        Self {
            id: invoice.id,
            currency: invoice.currency().code().to_string(),
            total_amount: money(&invoice.total_amount),
            paid_amount: money(&view.paid),
            balance: money(&view.balance),
            status: view.status,
            line_items: invoice
                .line_items
                .into_iter()
                .map(|item| LineItemResponse {
                    amount: money(&item.amount),
                    description: item.description,
                })
                .collect(),
            payments: view.payments.into_iter().map(PaymentResponse::from).collect(),
            cancellation: invoice.cancellation.map(|c| CancellationResponse {
                cancelled_at: c.cancelled_at,
                cancelled_by: c.cancelled_by,
                reason: c.reason,
            }),
            invoice_number: invoice.invoice_number,
            student_id: invoice.student_id,
            student_name: invoice.student_name,
            class_id: invoice.class_id,
            fee_plan: invoice.fee_plan,
            period_label: invoice.period_label,
            period_start: invoice.period_start,
            period_end: invoice.period_end,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            created_at: invoice.created_at,
        }
    }
}

/// A challan created by a generation run
#[derive(Debug, Serialize)]
pub struct CreatedChallan {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub student_id: StudentId,
    pub student_name: String,
    pub period_label: String,
    pub total_amount: String,
    pub due_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub created_count: usize,
    pub skipped_count: usize,
    pub created: Vec<CreatedChallan>,
    pub skipped: Vec<SkippedStudent>,
}

impl From<GenerationReport> for GenerationResponse {
    fn from(report: GenerationReport) -> Self {
        Self {
            created_count: report.created_count(),
            skipped_count: report.skipped_count(),
            created: report
                .created
                .into_iter()
                .map(|invoice| CreatedChallan {
                    id: invoice.id,
                    total_amount: money(&invoice.total_amount),
                    invoice_number: invoice.invoice_number,
                    student_id: invoice.student_id,
                    student_name: invoice.student_name,
                    period_label: invoice.period_label,
                    due_date: invoice.due_date,
                })
                .collect(),
            skipped: report.skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(class_id: Option<ClassId>, student_id: Option<StudentId>) -> GenerateChallansRequest {
        GenerateChallansRequest {
            class_id,
            student_id,
            month: 3,
            year: 2025,
            due_in_days: Some(7),
        }
    }

    #[test]
    fn test_generate_request_requires_one_target() {
        assert!(request(None, None).into_domain().is_err());
        assert!(request(Some(ClassId::new()), Some(StudentId::new())).into_domain().is_err());

        let student_id = StudentId::new();
        let domain = request(None, Some(student_id)).into_domain().unwrap();
        assert_eq!(domain, GenerationRequest::for_student(student_id, 3, 2025).due_in(7));
    }

    #[test]
    fn test_generate_request_bounds() {
        let mut bad_month = request(Some(ClassId::new()), None);
        bad_month.month = 13;
        assert!(matches!(bad_month.into_domain(), Err(ApiError::Validation(_))));

        let mut far_due = request(Some(ClassId::new()), None);
        far_due.due_in_days = Some(366);
        assert!(matches!(far_due.into_domain(), Err(ApiError::Validation(_))));
    }
}
