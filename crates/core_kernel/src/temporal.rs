//! Time handling for billing
//!
//! Due dates and overdue checks are calendar-date comparisons made in the
//! school's local timezone. This module provides:
//! - [`Timezone`]: a serializable wrapper over `chrono_tz::Tz`
//! - [`Clock`]: an injectable source of "now" so billing logic stays deterministic

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

/// Timezone wrapper for school locations
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Returns the IANA name of the timezone
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Converts a UTC instant to the local calendar date
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.0).date_naive()
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::Asia::Karachi)
    }
}

/// Source of the current instant
///
/// Services take an `Arc<dyn Clock>` so tests can pin "today" when checking
/// overdue status and defaulter ageing.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant
    fn now(&self) -> DateTime<Utc>;

    /// Returns today's calendar date in the given timezone
    fn today(&self, tz: Timezone) -> NaiveDate {
        tz.local_date(self.now())
    }
}

/// Wall clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that returns a settable instant
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Arc::new(RwLock::new(instant)),
        }
    }

    /// Creates a clock pinned to noon UTC on the given date
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc())
    }

    /// Moves the clock to a new instant
    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut guard) = self.instant.write() {
            *guard = instant;
        }
    }

    /// Moves the clock to noon UTC on the given date
    pub fn set_date(&self, date: NaiveDate) {
        self.set(date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc());
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.instant.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_date_crosses_midnight() {
        // 20:30 UTC is already the next day in Karachi (UTC+5)
        let utc = Utc.with_ymd_and_hms(2025, 3, 31, 20, 30, 0).unwrap();
        let tz = Timezone::default();
        assert_eq!(tz.local_date(utc), NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
    }

    #[test]
    fn test_timezone_serde() {
        let tz = Timezone(chrono_tz::Asia::Kolkata);
        let json = serde_json::to_string(&tz).unwrap();
        assert_eq!(json, "\"Asia/Kolkata\"");
        let back: Timezone = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tz);
        assert!(serde_json::from_str::<Timezone>("\"Mars/Olympus\"").is_err());
    }

    #[test]
    fn test_fixed_clock_is_settable() {
        let clock = FixedClock::at_date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(
            clock.today(Timezone::default()),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );

        clock.set_date(NaiveDate::from_ymd_opt(2025, 4, 15).unwrap());
        assert_eq!(
            clock.today(Timezone::default()),
            NaiveDate::from_ymd_opt(2025, 4, 15).unwrap()
        );
    }
}
