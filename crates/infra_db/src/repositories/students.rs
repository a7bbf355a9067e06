//! Student and class repository
//!
//! Master data is maintained by the school administration screens; billing
//! only reads it.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::repositories::billing::FeePlanType;

const STUDENT_COLUMNS: &str = r#"
    id, school_id, class_id, name, fee_plan, base_fee, discount_percent, currency, status
"#;

/// Repository for reading students and classes
#[derive(Debug, Clone)]
pub struct StudentRepository {
    pool: PgPool,
}

impl StudentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_student(
        &self,
        school_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<StudentRow>, DatabaseError> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE school_id = $1 AND id = $2"
        ))
        .bind(school_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Lists every student of a class, active or not, ordered by name
    pub async fn list_class_students(
        &self,
        school_id: Uuid,
        class_id: Uuid,
    ) -> Result<Vec<StudentRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, StudentRow>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE school_id = $1 AND class_id = $2 ORDER BY name, id"
        ))
        .bind(school_id)
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_class(
        &self,
        school_id: Uuid,
        class_id: Uuid,
    ) -> Result<Option<ClassRow>, DatabaseError> {
        let row = sqlx::query_as::<_, ClassRow>(
            "SELECT id, school_id, name FROM classes WHERE school_id = $1 AND id = $2",
        )
        .bind(school_id)
        .bind(class_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_classes(&self, school_id: Uuid) -> Result<Vec<ClassRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ClassRow>(
            "SELECT id, school_id, name FROM classes WHERE school_id = $1 ORDER BY name",
        )
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Student status column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "student_status", rename_all = "snake_case")]
pub enum StudentStatusType {
    Active,
    Inactive,
}

/// Database row for a student
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StudentRow {
    pub id: Uuid,
    pub school_id: Uuid,
    pub class_id: Uuid,
    pub name: String,
    pub fee_plan: FeePlanType,
    pub base_fee: Decimal,
    pub discount_percent: Decimal,
    pub currency: String,
    pub status: StudentStatusType,
}

/// Database row for a class
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClassRow {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
}
