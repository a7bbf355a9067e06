//! API configuration

use serde::Deserialize;

use domain_billing::BillingConfig;
use infra_db::DatabaseConfig;

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Connection pool settings
    pub database: DatabaseConfig,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    pub log_format: LogFormat,
    /// Billing rules shared by every school on this deployment
    pub billing: BillingConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database: DatabaseConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            billing: BillingConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `config/fees.toml` (optional) and `API_*` variables
    ///
    /// Nested keys use a double underscore, e.g.
    /// `API_BILLING__FISCAL_YEAR_START_MONTH=7` or `API_DATABASE__URL=postgres://...`.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("config/fees").required(false))
            .add_source(
                config::Environment::with_prefix("API")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.billing.invoice_prefix, "CH");
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let config: ApiConfig = config::Config::builder()
            .set_override("port", 9090)
            .unwrap()
            .set_override("log_format", "json")
            .unwrap()
            .set_override("billing.fiscal_year_start_month", 7)
            .unwrap()
            .set_override("database.max_connections", 25)
            .unwrap()
            .set_override("database.idle_timeout_secs", 0)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.billing.fiscal_year_start_month, 7);
        assert_eq!(config.billing.default_due_in_days, 10);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.database.max_connections, 25);
        assert_eq!(config.database.idle_timeout_secs, 0);
        assert_eq!(config.database.min_connections, 2);
        assert!(config.database.pool_options().is_ok());
    }
}
