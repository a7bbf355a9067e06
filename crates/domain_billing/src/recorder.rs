//! Payment recording and correction
//!
//! Both paths use the same optimistic protocol: read the challan and its
//! payments, decide, then ask the store to write only if the payment total
//! is still the one the decision was based on. A conflict means another
//! clerk got there first, so the recorder re-reads and decides again, up to
//! `billing.max_payment_attempts` times.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{Clock, InvoiceId, Money, PaymentId, PortError, TenantContext};

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::ledger::{InvoiceLedger, InvoiceView};
use crate::payment::{Payment, PaymentRequest};
use crate::ports::BillingStore;
use crate::status::derive_status;

/// A stored payment and the challan as it stands after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub invoice: InvoiceView,
}

/// Records and deletes payments against challans
pub struct PaymentRecorder {
    store: Arc<dyn BillingStore>,
    clock: Arc<dyn Clock>,
    config: Arc<BillingConfig>,
}

impl PaymentRecorder {
    pub fn new(store: Arc<dyn BillingStore>, clock: Arc<dyn Clock>, config: Arc<BillingConfig>) -> Self {
        Self { store, clock, config }
    }

    /// Records a payment against a challan
    ///
    /// # Errors
    ///
    /// * `Validation` - non-positive amount, bad reference or a future date
    /// * `InvoiceNotFound` - unknown challan in this school
    /// * `InvoiceCancelled` - the challan is cancelled
    /// * `InsufficientBalance` - the amount exceeds the outstanding balance
    /// * `ConcurrencyConflict` - concurrent writers won every attempt
    #[instrument(
        skip(self, ctx, request),
        fields(school_id = %ctx.school_id, invoice_id = %invoice_id, amount = %request.amount)
    )]
    pub async fn record(
        &self,
        ctx: &TenantContext,
        invoice_id: InvoiceId,
        request: PaymentRequest,
    ) -> Result<PaymentReceipt, BillingError> {
        request.validate()?;
        let today = self.clock.today(self.config.timezone);
        let payment_date = request.payment_date.unwrap_or(today);
        if payment_date > today {
            return Err(BillingError::validation(format!(
                "payment date {payment_date} is in the future"
            )));
        }

        for attempt in 1..=self.attempts() {
            let ledger = self.load(ctx, invoice_id).await?;
            let invoice = &ledger.invoice;
            if invoice.is_cancelled() {
                return Err(BillingError::InvoiceCancelled {
                    invoice_id,
                    student_id: invoice.student_id,
                });
            }

            let assessment = ledger.assess(today)?;
            let amount = Money::new(request.amount, invoice.currency());
            if amount.amount() > assessment.balance.amount() {
                return Err(BillingError::InsufficientBalance {
                    invoice_id,
                    student_id: invoice.student_id,
                    requested: amount,
                    balance: assessment.balance,
                });
            }

            let paid = assessment.paid.checked_add(&amount)?;
            let status = derive_status(invoice.total_amount, paid, invoice.due_date, today, false);
            let periods_covered = if request.periods_covered.is_empty() {
                invoice.period().month_labels()
            } else {
                request.periods_covered.clone()
            };
            let payment = Payment {
                id: PaymentId::new_v7(),
                school_id: ctx.school_id,
                invoice_id,
                student_id: invoice.student_id,
                amount,
                payment_date,
                method: request.method,
                reference: request.reference.clone(),
                periods_covered,
                notes: request.notes.clone(),
                recorded_by: ctx.user_id,
                created_at: Utc::now(),
            };

            match self.store.append_payment(&payment, assessment.paid, status).await {
                Ok(()) => {
                    info!(
                        payment_id = %payment.id,
                        student_id = %payment.student_id,
                        status = %status,
                        "Payment recorded"
                    );
                    let InvoiceLedger { mut invoice, mut payments } = ledger;
                    invoice.status = status;
                    payments.push(payment.clone());
                    let balance = invoice.total_amount.checked_sub(&paid)?;
                    return Ok(PaymentReceipt {
                        payment,
                        invoice: InvoiceView {
                            invoice,
                            payments,
                            paid,
                            balance,
                            status,
                        },
                    });
                }
                Err(e) => self.handle_write_error(ctx, invoice_id, attempt, e)?,
            }
        }

        Err(BillingError::ConcurrencyConflict { invoice_id })
    }

    /// Deletes a payment and re-derives the challan's status
    ///
    /// A cancelled challan stays cancelled.
    #[instrument(skip(self, ctx), fields(school_id = %ctx.school_id, payment_id = %payment_id))]
    pub async fn delete(
        &self,
        ctx: &TenantContext,
        payment_id: PaymentId,
    ) -> Result<InvoiceView, BillingError> {
        let today = self.clock.today(self.config.timezone);
        let mut invoice_id = None;

        for attempt in 1..=self.attempts() {
            let payment = self
                .store
                .get_payment(ctx.school_id, payment_id)
                .await?
                .ok_or(BillingError::PaymentNotFound {
                    school_id: ctx.school_id,
                    payment_id,
                })?;
            invoice_id = Some(payment.invoice_id);

            let ledger = self.load(ctx, payment.invoice_id).await?;
            let assessment = ledger.assess(today)?;
            let paid = assessment.paid.checked_sub(&payment.amount)?;
            let invoice = &ledger.invoice;
            let status = derive_status(
                invoice.total_amount,
                paid,
                invoice.due_date,
                today,
                invoice.is_cancelled(),
            );

            match self
                .store
                .remove_payment(ctx.school_id, payment_id, assessment.paid, status)
                .await
            {
                Ok(()) => {
                    info!(
                        invoice_id = %payment.invoice_id,
                        amount = %payment.amount,
                        status = %status,
                        "Payment deleted"
                    );
                    let InvoiceLedger { mut invoice, mut payments } = ledger;
                    invoice.status = status;
                    payments.retain(|p| p.id != payment_id);
                    let balance = invoice.total_amount.checked_sub(&paid)?;
                    return Ok(InvoiceView {
                        invoice,
                        payments,
                        paid,
                        balance,
                        status,
                    });
                }
                Err(e) if e.is_not_found() => {
                    return Err(BillingError::PaymentNotFound {
                        school_id: ctx.school_id,
                        payment_id,
                    })
                }
                Err(e) => self.handle_write_error(ctx, payment.invoice_id, attempt, e)?,
            }
        }

        match invoice_id {
            Some(invoice_id) => Err(BillingError::ConcurrencyConflict { invoice_id }),
            None => Err(BillingError::PaymentNotFound {
                school_id: ctx.school_id,
                payment_id,
            }),
        }
    }

    fn attempts(&self) -> u32 {
        self.config.max_payment_attempts.max(1)
    }

    async fn load(&self, ctx: &TenantContext, invoice_id: InvoiceId) -> Result<InvoiceLedger, BillingError> {
        self.store
            .get_ledger(ctx.school_id, invoice_id)
            .await?
            .ok_or(BillingError::InvoiceNotFound {
                school_id: ctx.school_id,
                invoice_id,
            })
    }

    /// Swallows a conflict so the caller retries; anything else is fatal
    fn handle_write_error(
        &self,
        ctx: &TenantContext,
        invoice_id: InvoiceId,
        attempt: u32,
        error: PortError,
    ) -> Result<(), BillingError> {
        if error.is_conflict() {
            warn!(attempt, max_attempts = self.attempts(), error = %error, "Invoice changed underneath payment write, retrying");
            Ok(())
        } else if error.is_not_found() {
            Err(BillingError::InvoiceNotFound {
                school_id: ctx.school_id,
                invoice_id,
            })
        } else {
            Err(BillingError::Storage(error))
        }
    }
}
