//! PostgreSQL Student Directory
//!
//! Read-only adapter onto the `students` and `classes` tables.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    ClassId, Currency, DomainPort, HealthCheckResult, HealthCheckable, Money, PortError, SchoolId,
    StudentId,
};
use domain_billing::{SchoolClass, Student, StudentDirectory, StudentStatus};

use crate::adapters::billing::fee_plan_from_db;
use crate::repositories::students::{ClassRow, StudentRepository, StudentRow, StudentStatusType};

/// PostgreSQL-backed implementation of the [`StudentDirectory`] port
#[derive(Debug, Clone)]
pub struct PostgresStudentDirectory {
    repository: StudentRepository,
    pool: PgPool,
}

impl PostgresStudentDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: StudentRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresStudentDirectory {}

#[async_trait]
impl HealthCheckable for PostgresStudentDirectory {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(&self.pool, "postgres-student-directory").await
    }
}

#[async_trait]
impl StudentDirectory for PostgresStudentDirectory {
    #[instrument(skip(self), fields(school_id = %school_id, student_id = %student_id))]
    async fn get_student(
        &self,
        school_id: SchoolId,
        student_id: StudentId,
    ) -> Result<Option<Student>, PortError> {
        debug!("Fetching student");
        self.repository
            .get_student(*school_id.as_uuid(), *student_id.as_uuid())
            .await?
            .map(student_from_row)
            .transpose()
    }

    #[instrument(skip(self), fields(school_id = %school_id, class_id = %class_id))]
    async fn list_class_students(
        &self,
        school_id: SchoolId,
        class_id: ClassId,
    ) -> Result<Vec<Student>, PortError> {
        let rows = self
            .repository
            .list_class_students(*school_id.as_uuid(), *class_id.as_uuid())
            .await?;
        debug!(count = rows.len(), "Fetched class roster");
        rows.into_iter().map(student_from_row).collect()
    }

    async fn get_class(
        &self,
        school_id: SchoolId,
        class_id: ClassId,
    ) -> Result<Option<SchoolClass>, PortError> {
        Ok(self
            .repository
            .get_class(*school_id.as_uuid(), *class_id.as_uuid())
            .await?
            .map(class_from_row))
    }

    async fn list_classes(&self, school_id: SchoolId) -> Result<Vec<SchoolClass>, PortError> {
        Ok(self
            .repository
            .list_classes(*school_id.as_uuid())
            .await?
            .into_iter()
            .map(class_from_row)
            .collect())
    }
}

fn student_from_row(row: StudentRow) -> Result<Student, PortError> {
    let currency: Currency = row
        .currency
        .parse()
        .map_err(|e: core_kernel::MoneyError| PortError::transformation(e.to_string()))?;

    Ok(Student {
        id: StudentId::from_uuid(row.id),
        school_id: SchoolId::from_uuid(row.school_id),
        name: row.name,
        class_id: ClassId::from_uuid(row.class_id),
        fee_plan: fee_plan_from_db(row.fee_plan),
        base_fee: Money::new(row.base_fee, currency),
        discount_percent: row.discount_percent,
        status: match row.status {
            StudentStatusType::Active => StudentStatus::Active,
            StudentStatusType::Inactive => StudentStatus::Inactive,
        },
    })
}

fn class_from_row(row: ClassRow) -> SchoolClass {
    SchoolClass {
        id: ClassId::from_uuid(row.id),
        school_id: SchoolId::from_uuid(row.school_id),
        name: row.name,
    }
}
