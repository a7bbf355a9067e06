//! Billing configuration

use serde::{Deserialize, Serialize};

use core_kernel::{CoreError, Currency, Timezone};

use crate::invoice::MAX_DUE_IN_DAYS;
use crate::period::FiscalCalendar;

/// Per-deployment billing settings
///
/// Every field has a default so a partial configuration file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Currency all fees and payments are expressed in
    pub currency: Currency,
    /// School timezone used for "today", issue dates and overdue checks
    pub timezone: Timezone,
    /// Month (1-12) the fiscal year and academic session start in
    pub fiscal_year_start_month: u32,
    /// Due window used when a generation request omits one
    pub default_due_in_days: u32,
    /// Invoices written per storage transaction during generation
    pub generation_chunk_size: usize,
    /// Optimistic attempts before a payment gives up with a conflict
    pub max_payment_attempts: u32,
    /// Prefix of challan numbers
    pub invoice_prefix: String,
    /// Write discounts as a separate negative line item
    pub itemize_discount: bool,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            currency: Currency::PKR,
            timezone: Timezone::default(),
            fiscal_year_start_month: 4,
            default_due_in_days: 10,
            generation_chunk_size: 50,
            max_payment_attempts: 3,
            invoice_prefix: "CH".to_string(),
            itemize_discount: true,
        }
    }
}

impl BillingConfig {
    /// Validates the configuration
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(1..=12).contains(&self.fiscal_year_start_month) {
            return Err(CoreError::configuration(format!(
                "billing.fiscal_year_start_month must be 1-12, got {}",
                self.fiscal_year_start_month
            )));
        }
        if self.default_due_in_days > MAX_DUE_IN_DAYS {
            return Err(CoreError::configuration(format!(
                "billing.default_due_in_days must be at most {MAX_DUE_IN_DAYS}"
            )));
        }
        if self.generation_chunk_size == 0 {
            return Err(CoreError::configuration("billing.generation_chunk_size must be positive"));
        }
        if self.max_payment_attempts == 0 {
            return Err(CoreError::configuration("billing.max_payment_attempts must be positive"));
        }
        let prefix = self.invoice_prefix.trim();
        if prefix.is_empty()
            || prefix.len() > 10
            || !prefix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(CoreError::configuration(
                "billing.invoice_prefix must be 1-10 ASCII letters or digits",
            ));
        }
        Ok(())
    }

    /// Returns the fiscal calendar for period resolution
    pub fn fiscal_calendar(&self) -> Result<FiscalCalendar, CoreError> {
        FiscalCalendar::new(self.fiscal_year_start_month)
            .map_err(|e| CoreError::configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BillingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fiscal_calendar().unwrap().start_month(), 4);
        assert_eq!(config.timezone.name(), "Asia/Karachi");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: BillingConfig =
            serde_json::from_str(r#"{"currency": "INR", "fiscal_year_start_month": 1}"#).unwrap();
        assert_eq!(config.currency, Currency::INR);
        assert_eq!(config.fiscal_year_start_month, 1);
        assert_eq!(config.generation_chunk_size, 50);
        assert_eq!(config.invoice_prefix, "CH");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = BillingConfig::default();
        config.fiscal_year_start_month = 13;
        assert!(config.validate().is_err());

        let mut config = BillingConfig::default();
        config.generation_chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = BillingConfig::default();
        config.invoice_prefix = "CH-".to_string();
        assert!(config.validate().is_err());

        let mut config = BillingConfig::default();
        config.default_due_in_days = 400;
        assert!(config.validate().is_err());
    }
}
