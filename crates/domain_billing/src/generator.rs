//! Challan generation
//!
//! Bills a class (or a single student) for the period their fee plan covers
//! in a target month. Generation is idempotent on `(student, period)`:
//! slots that already hold an open challan are skipped and reported, both
//! by a pre-check and by the store's uniqueness guard on insert.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{ClassId, Clock, StudentId, TenantContext};

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::invoice::{Invoice, InvoiceDraft, MAX_DUE_IN_DAYS};
use crate::period::{resolve_period, validate_month_year, FiscalCalendar};
use crate::ports::{BillingStore, InsertOutcome, PeriodKey, StudentDirectory};
use crate::student::Student;

/// Who a generation run bills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum BillingTarget {
    /// Every active student of a class
    Class(ClassId),
    /// One student
    Student(StudentId),
}

/// Input for a generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub target: BillingTarget,
    pub month: u32,
    pub year: i32,
    /// Falls back to `billing.default_due_in_days`
    pub due_in_days: Option<u32>,
}

impl GenerationRequest {
    pub fn for_class(class_id: ClassId, month: u32, year: i32) -> Self {
        Self {
            target: BillingTarget::Class(class_id),
            month,
            year,
            due_in_days: None,
        }
    }

    pub fn for_student(student_id: StudentId, month: u32, year: i32) -> Self {
        Self {
            target: BillingTarget::Student(student_id),
            month,
            year,
            due_in_days: None,
        }
    }

    pub fn due_in(mut self, days: u32) -> Self {
        self.due_in_days = Some(days);
        self
    }
}

/// Why a student got no new challan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// An open challan already covers the period
    AlreadyBilled { invoice_number: String },
    Inactive,
    /// Final fee is zero
    NoFeeDue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedStudent {
    pub student_id: StudentId,
    pub student_name: String,
    pub period_label: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Outcome of a generation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub created: Vec<Invoice>,
    pub skipped: Vec<SkippedStudent>,
}

impl GenerationReport {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Number of students skipped because their period was already billed
    pub fn already_billed_count(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::AlreadyBilled { .. }))
            .count()
    }

    fn skip(&mut self, student: &Student, period_label: &str, reason: SkipReason) {
        self.skipped.push(SkippedStudent {
            student_id: student.id,
            student_name: student.name.clone(),
            period_label: period_label.to_string(),
            reason,
        });
    }
}

/// Issues challans for classes and students
pub struct ChallanGenerator {
    store: Arc<dyn BillingStore>,
    directory: Arc<dyn StudentDirectory>,
    clock: Arc<dyn Clock>,
    config: Arc<BillingConfig>,
    calendar: FiscalCalendar,
}

impl ChallanGenerator {
    pub fn new(
        store: Arc<dyn BillingStore>,
        directory: Arc<dyn StudentDirectory>,
        clock: Arc<dyn Clock>,
        config: Arc<BillingConfig>,
    ) -> Result<Self, BillingError> {
        let calendar = FiscalCalendar::new(config.fiscal_year_start_month)?;
        Ok(Self {
            store,
            directory,
            clock,
            config,
            calendar,
        })
    }

    /// Generates challans for the request's target
    ///
    /// # Errors
    ///
    /// * `Validation` - bad month, year, due window or student fee terms;
    ///   nothing is written
    /// * `ClassNotFound` / `StudentNotFound` - unknown target in this school
    /// * `PartialGeneration` - a chunk failed to store; the report lists
    ///   what was created before the failure
    #[instrument(
        skip(self, ctx),
        fields(school_id = %ctx.school_id, user_id = %ctx.user_id)
    )]
    pub async fn generate(
        &self,
        ctx: &TenantContext,
        request: GenerationRequest,
    ) -> Result<GenerationReport, BillingError> {
        validate_month_year(request.month, request.year)?;
        let due_in_days = request.due_in_days.unwrap_or(self.config.default_due_in_days);
        if due_in_days > MAX_DUE_IN_DAYS {
            return Err(BillingError::validation(format!(
                "due_in_days must be at most {MAX_DUE_IN_DAYS}, got {due_in_days}"
            )));
        }

        let mut report = GenerationReport::default();
        let students = self.resolve_targets(ctx, &request, &mut report).await?;

        let issue_date = self.clock.today(self.config.timezone);
        let mut drafts = Vec::with_capacity(students.len());
        for student in &students {
            let period = resolve_period(student.fee_plan, request.month, request.year, &self.calendar)?;
            if student.final_fee()?.is_zero() {
                report.skip(student, &period.label, SkipReason::NoFeeDue);
                continue;
            }
            drafts.push(InvoiceDraft::for_student(
                student,
                period,
                issue_date,
                due_in_days,
                ctx.user_id,
                self.config.itemize_discount,
            )?);
        }

        let drafts = self.drop_already_billed(ctx, drafts, &students, &mut report).await?;
        self.insert_in_chunks(ctx, drafts, report).await
    }

    async fn resolve_targets(
        &self,
        ctx: &TenantContext,
        request: &GenerationRequest,
        report: &mut GenerationReport,
    ) -> Result<Vec<Student>, BillingError> {
        match request.target {
            BillingTarget::Class(class_id) => {
                self.directory
                    .get_class(ctx.school_id, class_id)
                    .await?
                    .ok_or(BillingError::ClassNotFound {
                        school_id: ctx.school_id,
                        class_id,
                    })?;
                let students = self.directory.list_class_students(ctx.school_id, class_id).await?;
                Ok(students.into_iter().filter(Student::is_active).collect())
            }
            BillingTarget::Student(student_id) => {
                let student = self
                    .directory
                    .get_student(ctx.school_id, student_id)
                    .await?
                    .ok_or(BillingError::StudentNotFound {
                        school_id: ctx.school_id,
                        student_id,
                    })?;
                if student.is_active() {
                    Ok(vec![student])
                } else {
                    let period =
                        resolve_period(student.fee_plan, request.month, request.year, &self.calendar)?;
                    report.skip(&student, &period.label, SkipReason::Inactive);
                    Ok(Vec::new())
                }
            }
        }
    }

    async fn drop_already_billed(
        &self,
        ctx: &TenantContext,
        drafts: Vec<InvoiceDraft>,
        students: &[Student],
        report: &mut GenerationReport,
    ) -> Result<Vec<InvoiceDraft>, BillingError> {
        if drafts.is_empty() {
            return Ok(drafts);
        }

        let keys: Vec<PeriodKey> = drafts
            .iter()
            .map(|d| PeriodKey::new(d.student_id, d.period.label.clone()))
            .collect();
        let billed = self.store.find_billed(ctx.school_id, &keys).await?;
        if billed.is_empty() {
            return Ok(drafts);
        }

        let by_id: HashMap<StudentId, &Student> = students.iter().map(|s| (s.id, s)).collect();
        let mut remaining = Vec::with_capacity(drafts.len());
        for (draft, key) in drafts.into_iter().zip(keys) {
            match (billed.get(&key), by_id.get(&draft.student_id)) {
                (Some(number), Some(student)) => report.skip(
                    student,
                    &key.period_label,
                    SkipReason::AlreadyBilled {
                        invoice_number: number.clone(),
                    },
                ),
                _ => remaining.push(draft),
            }
        }
        Ok(remaining)
    }

    async fn insert_in_chunks(
        &self,
        ctx: &TenantContext,
        drafts: Vec<InvoiceDraft>,
        mut report: GenerationReport,
    ) -> Result<GenerationReport, BillingError> {
        let chunk_size = self.config.generation_chunk_size.max(1);
        let mut pending: Vec<InvoiceDraft> = drafts;

        while !pending.is_empty() {
            let rest = pending.split_off(chunk_size.min(pending.len()));
            let chunk = std::mem::replace(&mut pending, rest);
            let chunk_students: Vec<StudentId> = chunk.iter().map(|d| d.student_id).collect();
            let names: HashMap<StudentId, String> = chunk
                .iter()
                .map(|d| (d.student_id, d.student_name.clone()))
                .collect();

            let outcomes = match self
                .store
                .insert_invoices(ctx.school_id, &self.config.invoice_prefix, chunk)
                .await
            {
                Ok(outcomes) => outcomes,
                Err(source) => {
                    let remaining: Vec<StudentId> = chunk_students
                        .into_iter()
                        .chain(pending.iter().map(|d| d.student_id))
                        .collect();
                    warn!(
                        created = report.created_count(),
                        pending = remaining.len(),
                        error = %source,
                        "Challan chunk failed to store"
                    );
                    return Err(BillingError::PartialGeneration {
                        report: Box::new(report),
                        pending: remaining,
                        source,
                    });
                }
            };

            for outcome in outcomes {
                match outcome {
                    InsertOutcome::Created(invoice) => report.created.push(invoice),
                    InsertOutcome::AlreadyBilled { key, invoice_number } => {
                        let student_name = names.get(&key.student_id).cloned().unwrap_or_default();
                        info!(
                            student_id = %key.student_id,
                            period = %key.period_label,
                            %invoice_number,
                            "Slot billed concurrently, skipping"
                        );
                        report.skipped.push(SkippedStudent {
                            student_id: key.student_id,
                            student_name,
                            period_label: key.period_label,
                            reason: SkipReason::AlreadyBilled { invoice_number },
                        });
                    }
                }
            }
        }

        info!(
            created = report.created_count(),
            skipped = report.skipped_count(),
            already_billed = report.already_billed_count(),
            "Challan generation completed"
        );
        Ok(report)
    }
}
