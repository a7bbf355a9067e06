//! Billing service facade
//!
//! [`BillingService`] is the single entry point used by the HTTP layer. It
//! owns the generator and recorder, resolves "today" in the school's
//! timezone and turns ledgers into derived views and reports.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{
    ClassId, Clock, HealthCheckResult, InvoiceId, PaymentId, StudentId, TenantContext,
};

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::generator::{ChallanGenerator, GenerationReport, GenerationRequest};
use crate::invoice::{Cancellation, InvoiceStatus};
use crate::ledger::{InvoiceLedger, InvoiceView};
use crate::payment::{Payment, PaymentRequest};
use crate::period::{resolve_period, BillingPeriod, FeePlan, FiscalCalendar};
use crate::ports::{BillingStore, InvoiceQuery, PaymentQuery, StudentDirectory};
use crate::recorder::{PaymentReceipt, PaymentRecorder};
use crate::reporting::{
    class_summary, collection_report, defaulters, student_statement, ClassSummaryRow,
    CollectionReport, DefaulterFilter, DefaulterRow, StudentStatement,
};

/// Fee billing use cases for one deployment
pub struct BillingService {
    store: Arc<dyn BillingStore>,
    directory: Arc<dyn StudentDirectory>,
    clock: Arc<dyn Clock>,
    config: Arc<BillingConfig>,
    calendar: FiscalCalendar,
    generator: ChallanGenerator,
    recorder: PaymentRecorder,
}

impl BillingService {
    /// Creates the service
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Validation` when the configuration is invalid
    pub fn new(
        store: Arc<dyn BillingStore>,
        directory: Arc<dyn StudentDirectory>,
        clock: Arc<dyn Clock>,
        config: BillingConfig,
    ) -> Result<Self, BillingError> {
        config
            .validate()
            .map_err(|e| BillingError::validation(e.to_string()))?;
        let config = Arc::new(config);
        let calendar = FiscalCalendar::new(config.fiscal_year_start_month)?;

        Ok(Self {
            generator: ChallanGenerator::new(
                store.clone(),
                directory.clone(),
                clock.clone(),
                config.clone(),
            )?,
            recorder: PaymentRecorder::new(store.clone(), clock.clone(), config.clone()),
            store,
            directory,
            clock,
            config,
            calendar,
        })
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// Today's date in the school's timezone
    pub fn today(&self) -> NaiveDate {
        self.clock.today(self.config.timezone)
    }

    /// Resolves a plan and month to a billing period
    pub fn resolve_period(&self, plan: &str, month: u32, year: i32) -> Result<BillingPeriod, BillingError> {
        let plan: FeePlan = plan.parse()?;
        resolve_period(plan, month, year, &self.calendar)
    }

    pub async fn generate_challans(
        &self,
        ctx: &TenantContext,
        request: GenerationRequest,
    ) -> Result<GenerationReport, BillingError> {
        self.generator.generate(ctx, request).await
    }

    pub async fn record_payment(
        &self,
        ctx: &TenantContext,
        invoice_id: InvoiceId,
        request: PaymentRequest,
    ) -> Result<PaymentReceipt, BillingError> {
        self.recorder.record(ctx, invoice_id, request).await
    }

    pub async fn delete_payment(
        &self,
        ctx: &TenantContext,
        payment_id: PaymentId,
    ) -> Result<InvoiceView, BillingError> {
        self.recorder.delete(ctx, payment_id).await
    }

    /// Returns a challan with its payments and derived balance and status
    #[instrument(skip(self, ctx), fields(school_id = %ctx.school_id))]
    pub async fn get_invoice(
        &self,
        ctx: &TenantContext,
        invoice_id: InvoiceId,
    ) -> Result<InvoiceView, BillingError> {
        let ledger = self.load(ctx, invoice_id).await?;
        Ok(ledger.view(self.today())?)
    }

    /// Lists challans; the status filter applies to the derived status
    #[instrument(skip(self, ctx), fields(school_id = %ctx.school_id))]
    pub async fn list_invoices(
        &self,
        ctx: &TenantContext,
        query: InvoiceQuery,
    ) -> Result<Vec<InvoiceView>, BillingError> {
        let today = self.today();
        let ledgers = self.store.list_ledgers(ctx.school_id, &query).await?;
        let mut views = Vec::with_capacity(ledgers.len());
        for ledger in ledgers {
            let view = ledger.view(today)?;
            if query.status.map_or(true, |status| view.status == status) {
                views.push(view);
            }
        }
        Ok(views)
    }

    #[instrument(skip(self, ctx), fields(school_id = %ctx.school_id))]
    pub async fn list_payments(
        &self,
        ctx: &TenantContext,
        query: PaymentQuery,
    ) -> Result<Vec<Payment>, BillingError> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(BillingError::validation("'from' must not be after 'to'"));
            }
        }
        Ok(self.store.list_payments(ctx.school_id, &query).await?)
    }

    /// Soft-cancels a challan, freeing its period for re-generation
    ///
    /// Cancelling an already cancelled challan returns it unchanged. Fully
    /// paid challans cannot be cancelled.
    #[instrument(skip(self, ctx, reason), fields(school_id = %ctx.school_id))]
    pub async fn cancel_invoice(
        &self,
        ctx: &TenantContext,
        invoice_id: InvoiceId,
        reason: &str,
    ) -> Result<InvoiceView, BillingError> {
        let reason = reason.trim();
        if reason.is_empty() || reason.len() > 500 {
            return Err(BillingError::validation("cancellation reason must be 1-500 characters"));
        }

        let today = self.today();
        for attempt in 1..=self.config.max_payment_attempts.max(1) {
            let ledger = self.load(ctx, invoice_id).await?;
            if ledger.invoice.is_cancelled() {
                return Ok(ledger.view(today)?);
            }
            let assessment = ledger.assess(today)?;
            if assessment.status == InvoiceStatus::Paid {
                return Err(BillingError::InvalidOperation {
                    invoice_id,
                    message: "a fully paid challan cannot be cancelled".to_string(),
                });
            }

            let cancellation = Cancellation {
                cancelled_at: Utc::now(),
                cancelled_by: ctx.user_id,
                reason: reason.to_string(),
            };
            match self
                .store
                .cancel_invoice(ctx.school_id, invoice_id, &cancellation, assessment.paid)
                .await
            {
                Ok(()) => {
                    info!(invoice_id = %invoice_id, "Invoice cancelled");
                    let InvoiceLedger { mut invoice, payments } = ledger;
                    invoice.status = InvoiceStatus::Cancelled;
                    invoice.updated_at = cancellation.cancelled_at;
                    invoice.cancellation = Some(cancellation);
                    return Ok(InvoiceLedger::new(invoice, payments).view(today)?);
                }
                Err(e) if e.is_conflict() => {
                    warn!(attempt, error = %e, "Invoice changed during cancellation, retrying");
                }
                Err(e) if e.is_not_found() => {
                    return Err(BillingError::InvoiceNotFound {
                        school_id: ctx.school_id,
                        invoice_id,
                    })
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BillingError::ConcurrencyConflict { invoice_id })
    }

    /// Deletes a challan that has no payments
    #[instrument(skip(self, ctx), fields(school_id = %ctx.school_id))]
    pub async fn delete_invoice(&self, ctx: &TenantContext, invoice_id: InvoiceId) -> Result<(), BillingError> {
        let ledger = self.load(ctx, invoice_id).await?;
        if !ledger.payments.is_empty() {
            return Err(Self::has_payments(invoice_id));
        }

        match self.store.delete_invoice(ctx.school_id, invoice_id).await {
            Ok(()) => {
                info!(invoice_id = %invoice_id, invoice_number = %ledger.invoice.invoice_number, "Invoice deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(BillingError::InvoiceNotFound {
                school_id: ctx.school_id,
                invoice_id,
            }),
            Err(e) if e.is_conflict() => Err(Self::has_payments(invoice_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Students with outstanding balances
    #[instrument(skip(self, ctx), fields(school_id = %ctx.school_id))]
    pub async fn list_defaulters(
        &self,
        ctx: &TenantContext,
        filter: DefaulterFilter,
    ) -> Result<Vec<DefaulterRow>, BillingError> {
        if filter.min_days_overdue.is_some_and(|days| days < 0) {
            return Err(BillingError::validation("min_days_overdue cannot be negative"));
        }
        let query = InvoiceQuery {
            class_id: filter.class_id,
            ..Default::default()
        };
        let ledgers = self.store.list_ledgers(ctx.school_id, &query).await?;
        Ok(defaulters(&ledgers, self.today(), &filter)?)
    }

    /// Per-class collection figures for one period
    #[instrument(skip(self, ctx), fields(school_id = %ctx.school_id))]
    pub async fn class_summary(
        &self,
        ctx: &TenantContext,
        period_label: &str,
        class_id: Option<ClassId>,
    ) -> Result<Vec<ClassSummaryRow>, BillingError> {
        let period_label = period_label.trim();
        if period_label.is_empty() {
            return Err(BillingError::validation("period label is required"));
        }

        let query = InvoiceQuery {
            class_id,
            ..InvoiceQuery::for_period(period_label)
        };
        let ledgers = self.store.list_ledgers(ctx.school_id, &query).await?;
        let names: HashMap<_, _> = self
            .directory
            .list_classes(ctx.school_id)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        Ok(class_summary(&ledgers, period_label, self.today(), &names, class_id)?)
    }

    /// All open challans of a student with totals
    #[instrument(skip(self, ctx), fields(school_id = %ctx.school_id))]
    pub async fn student_statement(
        &self,
        ctx: &TenantContext,
        student_id: StudentId,
    ) -> Result<StudentStatement, BillingError> {
        let student = self
            .directory
            .get_student(ctx.school_id, student_id)
            .await?
            .ok_or(BillingError::StudentNotFound {
                school_id: ctx.school_id,
                student_id,
            })?;
        let ledgers = self
            .store
            .list_ledgers(ctx.school_id, &InvoiceQuery::for_student(student_id))
            .await?;
        let currency = ledgers
            .first()
            .map(|ledger| ledger.invoice.currency())
            .unwrap_or_else(|| student.base_fee.currency());
        Ok(student_statement(
            student_id,
            student.name,
            currency,
            ledgers,
            self.today(),
        )?)
    }

    /// Payments received in `[from, to]` grouped by method
    #[instrument(skip(self, ctx), fields(school_id = %ctx.school_id))]
    pub async fn collection_report(
        &self,
        ctx: &TenantContext,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CollectionReport, BillingError> {
        if from > to {
            return Err(BillingError::validation("'from' must not be after 'to'"));
        }
        let payments = self
            .store
            .list_payments(ctx.school_id, &PaymentQuery::between(from, to))
            .await?;
        let currency = payments
            .first()
            .map(|payment| payment.amount.currency())
            .unwrap_or(self.config.currency);
        Ok(collection_report(&payments, from, to, currency)?)
    }

    /// Health of the billing store
    pub async fn health(&self) -> HealthCheckResult {
        self.store.health_check().await
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

    fn has_payments(invoice_id: InvoiceId) -> BillingError {
        BillingError::InvalidOperation {
            invoice_id,
            message: "challan has payments; cancel it instead".to_string(),
        }
    }
}
