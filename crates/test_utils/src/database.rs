//! Database Test Utilities
//!
//! Provides a PostgreSQL testcontainer with the billing schema applied, and
//! helpers to seed the read-only class and student tables.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use tokio::sync::OnceCell;

use domain_billing::{SchoolClass, Student, StudentStatus};

const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "fees_test";
const POSTGRES_PASSWORD: &str = "fees_test";
const POSTGRES_DB: &str = "fees_test";

/// Configuration for test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    /// Creates the database connection URL
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A PostgreSQL test container with migrations applied
pub struct TestDatabase {
    _container: ContainerAsync<Postgres>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a new PostgreSQL container and runs the migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to start or migrations fail
    pub async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let container = Postgres::default()
            .with_user(POSTGRES_USER)
            .with_password(POSTGRES_PASSWORD)
            .with_db_name(POSTGRES_DB)
            .with_tag(POSTGRES_TAG)
            .start()
            .await?;

        let port = container.get_host_port_ipv4(5432).await?;
        let host = container.get_host().await?.to_string();

        let config = TestDatabaseConfig {
            host,
            port,
            ..Default::default()
        };

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.connection_url())
            .await?;

        infra_db::run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Clears all data while preserving the schema
    pub async fn clear_data(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "TRUNCATE TABLE payments, invoice_line_items, invoices, invoice_sequences, students, classes CASCADE",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts a class row
    pub async fn seed_class(&self, class: &SchoolClass) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO classes (id, school_id, name) VALUES ($1, $2, $3)")
            .bind(*class.id.as_uuid())
            .bind(*class.school_id.as_uuid())
            .bind(&class.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Inserts a student row
    pub async fn seed_student(&self, student: &Student) -> Result<(), sqlx::Error> {
        let status = match student.status {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
        };
        sqlx::query(
            r#"
            INSERT INTO students
                (id, school_id, class_id, name, fee_plan, base_fee, discount_percent, currency, status)
            VALUES ($1, $2, $3, $4, $5::fee_plan, $6, $7, $8, $9::student_status)
            "#,
        )
        .bind(*student.id.as_uuid())
        .bind(*student.school_id.as_uuid())
        .bind(*student.class_id.as_uuid())
        .bind(&student.name)
        .bind(student.fee_plan.as_str())
        .bind(student.base_fee.amount())
        .bind(student.discount_percent)
        .bind(student.base_fee.currency().code())
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Global test database for shared integration tests
static SHARED_TEST_DB: OnceCell<Arc<TestDatabase>> = OnceCell::const_new();

/// Gets or creates a shared test database instance
///
/// Tests sharing the database must use their own school ids to stay
/// isolated.
///
/// # Panics
///
/// Panics if the database fails to initialize
pub async fn get_shared_test_database() -> Arc<TestDatabase> {
    SHARED_TEST_DB
        .get_or_init(|| async {
            Arc::new(
                TestDatabase::new()
                    .await
                    .expect("Failed to create shared test database"),
            )
        })
        .await
        .clone()
}

/// Creates an isolated test database for a single test
pub async fn create_isolated_test_database() -> Result<TestDatabase, Box<dyn std::error::Error + Send + Sync>> {
    TestDatabase::new().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_connection_url() {
        let config = TestDatabaseConfig::default();
        let url = config.connection_url();

        assert!(url.starts_with("postgres://"));
        assert!(url.contains(POSTGRES_USER));
        assert!(url.ends_with(POSTGRES_DB));
    }
}
