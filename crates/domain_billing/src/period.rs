//! Billing periods
//!
//! Maps a fee plan and a target month onto the period label, start date and
//! end date used by challan generation. Quarters and sessions follow the
//! school's fiscal calendar, which in most Pakistani and Indian schools
//! starts in April.
//!
//! | Plan      | Example label      | Span                               |
//! |-----------|--------------------|------------------------------------|
//! | monthly   | `March 2025`       | first to last day of the month     |
//! | quarterly | `Q1 2025-26`       | three months of the fiscal quarter |
//! | annual    | `Session 2025-26`  | twelve months of the fiscal year   |

use chrono::{Datelike, Month, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BillingError;

/// Earliest year accepted for billing
pub const MIN_BILLING_YEAR: i32 = 2000;
/// Latest year accepted for billing
pub const MAX_BILLING_YEAR: i32 = 2200;

/// How often a student is billed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePlan {
    Monthly,
    Quarterly,
    Annual,
}

impl FeePlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeePlan::Monthly => "monthly",
            FeePlan::Quarterly => "quarterly",
            FeePlan::Annual => "annual",
        }
    }

    /// Number of calendar months one period spans
    pub fn months(&self) -> u32 {
        match self {
            FeePlan::Monthly => 1,
            FeePlan::Quarterly => 3,
            FeePlan::Annual => 12,
        }
    }
}

impl fmt::Display for FeePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeePlan {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(FeePlan::Monthly),
            "quarterly" => Ok(FeePlan::Quarterly),
            "annual" | "annually" | "yearly" => Ok(FeePlan::Annual),
            other => Err(BillingError::InvalidPlan(other.to_string())),
        }
    }
}

/// A school's fiscal calendar, identified by the month its year starts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalCalendar {
    start_month: u32,
}

impl FiscalCalendar {
    /// Creates a calendar whose fiscal year begins in `start_month` (1-12)
    pub fn new(start_month: u32) -> Result<Self, BillingError> {
        if !(1..=12).contains(&start_month) {
            return Err(BillingError::validation(format!(
                "fiscal year start month must be 1-12, got {start_month}"
            )));
        }
        Ok(Self { start_month })
    }

    /// Fiscal year equal to the calendar year
    pub fn calendar_year() -> Self {
        Self { start_month: 1 }
    }

    pub fn start_month(&self) -> u32 {
        self.start_month
    }

    /// Returns the calendar year in which the fiscal year containing
    /// `month`/`year` begins
    pub fn fiscal_start_year(&self, month: u32, year: i32) -> i32 {
        if month >= self.start_month {
            year
        } else {
            year - 1
        }
    }

    /// Formats a fiscal year, e.g. `2025-26`, or `2025` when it matches the
    /// calendar year
    pub fn fiscal_year_label(&self, start_year: i32) -> String {
        if self.start_month == 1 {
            start_year.to_string()
        } else {
            format!("{}-{:02}", start_year, (start_year + 1).rem_euclid(100))
        }
    }

    /// Returns the 1-based fiscal quarter containing `month`
    pub fn quarter_of(&self, month: u32) -> u32 {
        (month + 12 - self.start_month) % 12 / 3 + 1
    }
}

impl Default for FiscalCalendar {
    fn default() -> Self {
        Self { start_month: 4 }
    }
}

/// A resolved billing period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub plan: FeePlan,
    /// Human-readable label, unique per student within a school
    pub label: String,
    /// First day of the period
    pub start: NaiveDate,
    /// Last day of the period (inclusive)
    pub end: NaiveDate,
}

impl BillingPeriod {
    /// Returns true if `date` falls within the period
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Monthly labels of every month the period spans
    pub fn month_labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        let mut cursor = self.start;
        while cursor <= self.end {
            labels.push(month_label(cursor.month(), cursor.year()));
            match cursor.checked_add_months(Months::new(1)) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        labels
    }
}

/// Resolves the period a fee plan bills for the given month
///
/// # Arguments
///
/// * `plan` - The student's fee plan
/// * `month` - Target month, 1-12
/// * `year` - Target calendar year
/// * `calendar` - The school's fiscal calendar
///
/// # Errors
///
/// Returns `BillingError::Validation` for a month outside 1-12 or a year
/// outside the supported range.
pub fn resolve_period(
    plan: FeePlan,
    month: u32,
    year: i32,
    calendar: &FiscalCalendar,
) -> Result<BillingPeriod, BillingError> {
    validate_month_year(month, year)?;

    let (label, start) = match plan {
        FeePlan::Monthly => (month_label(month, year), first_of(year, month)?),
        FeePlan::Quarterly => {
            let quarter = calendar.quarter_of(month);
            let fiscal_year = calendar.fiscal_start_year(month, year);
            let start = add_months(
                first_of(fiscal_year, calendar.start_month())?,
                (quarter - 1) * 3,
            )?;
            (
                format!("Q{} {}", quarter, calendar.fiscal_year_label(fiscal_year)),
                start,
            )
        }
        FeePlan::Annual => {
            let fiscal_year = calendar.fiscal_start_year(month, year);
            (
                format!("Session {}", calendar.fiscal_year_label(fiscal_year)),
                first_of(fiscal_year, calendar.start_month())?,
            )
        }
    };

    let end = add_months(start, plan.months())?
        .pred_opt()
        .ok_or_else(|| out_of_range(year))?;

    Ok(BillingPeriod { plan, label, start, end })
}

/// Checks a target month and year without resolving a plan
pub fn validate_month_year(month: u32, year: i32) -> Result<(), BillingError> {
    if !(1..=12).contains(&month) {
        return Err(BillingError::validation(format!(
            "month must be between 1 and 12, got {month}"
        )));
    }
    if !(MIN_BILLING_YEAR..=MAX_BILLING_YEAR).contains(&year) {
        return Err(BillingError::validation(format!(
            "year must be between {MIN_BILLING_YEAR} and {MAX_BILLING_YEAR}, got {year}"
        )));
    }
    Ok(())
}

fn month_label(month: u32, year: i32) -> String {
    let name = u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("Unknown");
    format!("{name} {year}")
}

fn first_of(year: i32, month: u32) -> Result<NaiveDate, BillingError> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| out_of_range(year))
}

fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate, BillingError> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| out_of_range(date.year()))
}

fn out_of_range(year: i32) -> BillingError {
    BillingError::validation(format!("date out of range for year {year}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_period() {
        let period = resolve_period(FeePlan::Monthly, 3, 2025, &FiscalCalendar::default()).unwrap();
        assert_eq!(period.label, "March 2025");
        assert_eq!(period.start, date(2025, 3, 1));
        assert_eq!(period.end, date(2025, 3, 31));
    }

    #[test]
    fn test_monthly_february_leap_year() {
        let period = resolve_period(FeePlan::Monthly, 2, 2028, &FiscalCalendar::default()).unwrap();
        assert_eq!(period.end, date(2028, 2, 29));
    }

    #[test]
    fn test_quarter_in_april_fiscal_year() {
        let cal = FiscalCalendar::default();

        let q1 = resolve_period(FeePlan::Quarterly, 5, 2025, &cal).unwrap();
        assert_eq!(q1.label, "Q1 2025-26");
        assert_eq!(q1.start, date(2025, 4, 1));
        assert_eq!(q1.end, date(2025, 6, 30));

        // January belongs to the fourth quarter of the previous session
        let q4 = resolve_period(FeePlan::Quarterly, 1, 2026, &cal).unwrap();
        assert_eq!(q4.label, "Q4 2025-26");
        assert_eq!(q4.start, date(2026, 1, 1));
        assert_eq!(q4.end, date(2026, 3, 31));
    }

    #[test]
    fn test_quarter_with_calendar_fiscal_year() {
        let q = resolve_period(FeePlan::Quarterly, 8, 2025, &FiscalCalendar::calendar_year()).unwrap();
        assert_eq!(q.label, "Q3 2025");
        assert_eq!(q.start, date(2025, 7, 1));
        assert_eq!(q.end, date(2025, 9, 30));
    }

    #[test]
    fn test_annual_session() {
        let cal = FiscalCalendar::default();
        let session = resolve_period(FeePlan::Annual, 3, 2026, &cal).unwrap();
        assert_eq!(session.label, "Session 2025-26");
        assert_eq!(session.start, date(2025, 4, 1));
        assert_eq!(session.end, date(2026, 3, 31));
        assert_eq!(session.month_labels().len(), 12);
    }

    #[test]
    fn test_session_label_across_century() {
        let cal = FiscalCalendar::default();
        let session = resolve_period(FeePlan::Annual, 6, 2099, &cal).unwrap();
        assert_eq!(session.label, "Session 2099-00");
    }

    #[test]
    fn test_invalid_month_and_year() {
        let cal = FiscalCalendar::default();
        assert!(matches!(
            resolve_period(FeePlan::Monthly, 13, 2025, &cal),
            Err(BillingError::Validation(_))
        ));
        assert!(matches!(
            resolve_period(FeePlan::Monthly, 0, 2025, &cal),
            Err(BillingError::Validation(_))
        ));
        assert!(matches!(
            resolve_period(FeePlan::Annual, 5, 1999, &cal),
            Err(BillingError::Validation(_))
        ));
    }

    #[test]
    fn test_fee_plan_parsing() {
        assert_eq!("Quarterly".parse::<FeePlan>().unwrap(), FeePlan::Quarterly);
        assert_eq!("annual".parse::<FeePlan>().unwrap(), FeePlan::Annual);
        assert!(matches!(
            "weekly".parse::<FeePlan>(),
            Err(BillingError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_fiscal_calendar_rejects_bad_month() {
        assert!(FiscalCalendar::new(0).is_err());
        assert!(FiscalCalendar::new(13).is_err());
        assert_eq!(FiscalCalendar::new(7).unwrap().start_month(), 7);
    }

    #[test]
    fn test_quarter_contains_target_month() {
        let cal = FiscalCalendar::new(7).unwrap();
        for month in 1..=12 {
            let period = resolve_period(FeePlan::Quarterly, month, 2030, &cal).unwrap();
            assert!(period.contains(date(2030, month, 15)), "month {month}");
        }
    }
}
