//! Database connection pool management
//!
//! Pool settings are part of the server configuration (`[database]` in
//! `config/fees.toml`, or `API_DATABASE__*` variables). This module turns
//! them into a PostgreSQL pool and applies the embedded schema migrations.

use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use crate::error::DatabaseError;

/// Type alias for the PostgreSQL connection pool
pub type DatabasePool = PgPool;

/// Connection pool settings
///
/// Every field has a default, so a config source only needs to name the
/// settings it changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,
    pub max_connections: u32,
    /// Connections kept open while the server is idle
    pub min_connections: u32,
    /// How long a request waits for a free connection
    pub acquire_timeout_secs: u64,
    /// Idle connections above `min_connections` are closed after this; 0 keeps them
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/fees".to_string(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl DatabaseConfig {
    /// Default settings against `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Builds the pool options, rejecting settings sqlx would misbehave with
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidConfig` for an empty URL, a zero-sized
    /// pool, `min_connections > max_connections` or a zero acquire timeout
    pub fn pool_options(&self) -> Result<PgPoolOptions, DatabaseError> {
        if self.url.trim().is_empty() {
            return Err(DatabaseError::InvalidConfig("database url is empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(DatabaseError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(DatabaseError::InvalidConfig(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        if self.acquire_timeout_secs == 0 {
            return Err(DatabaseError::InvalidConfig(
                "acquire_timeout_secs must be positive".to_string(),
            ));
        }

        let idle_timeout = (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs));
        Ok(PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .idle_timeout(idle_timeout))
    }
}

/// Connects a pool with the given settings
///
/// # Errors
///
/// Returns `DatabaseError::InvalidConfig` for unusable settings and
/// `DatabaseError::ConnectionFailed` if the database cannot be reached
#[instrument(skip(config), fields(max_connections = config.max_connections))]
pub async fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    let pool = config
        .pool_options()?
        .connect(&config.url)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    info!(
        min_connections = config.min_connections,
        idle_timeout_secs = config.idle_timeout_secs,
        "Database pool created"
    );
    Ok(pool)
}

/// Applies the embedded schema migrations from the workspace `migrations/` directory
///
/// # Errors
///
/// Returns `DatabaseError::MigrationFailed` if a migration fails or a
/// previously applied migration was modified
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    info!("Running database migrations");
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_options_carry_settings() {
        let config = DatabaseConfig {
            max_connections: 25,
            min_connections: 5,
            acquire_timeout_secs: 3,
            idle_timeout_secs: 0,
            ..DatabaseConfig::new("postgres://db/fees")
        };

        let options = config.pool_options().unwrap();
        assert_eq!(options.get_max_connections(), 25);
        assert_eq!(options.get_min_connections(), 5);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(3));
        assert_eq!(options.get_idle_timeout(), None);
    }

    #[test]
    fn test_unusable_settings_are_rejected() {
        let inverted = DatabaseConfig {
            min_connections: 20,
            max_connections: 4,
            ..DatabaseConfig::default()
        };
        assert!(matches!(inverted.pool_options(), Err(DatabaseError::InvalidConfig(_))));

        let empty_url = DatabaseConfig::new("  ");
        assert!(matches!(empty_url.pool_options(), Err(DatabaseError::InvalidConfig(_))));

        let no_wait = DatabaseConfig {
            acquire_timeout_secs: 0,
            ..DatabaseConfig::default()
        };
        assert!(no_wait.pool_options().is_err());
    }
}
