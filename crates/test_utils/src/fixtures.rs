//! Pre-built Test Fixtures
//!
//! Provides ready-to-use money amounts, dates and tenants, plus a
//! [`BillingHarness`] wiring a `BillingService` over the in-process
//! adapters and a fixed clock.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{
    Clock, Currency, FixedClock, Money, SchoolId, TenantContext, UserId,
};
use domain_billing::{
    BillingConfig, BillingService, InMemoryBillingStore, InMemoryStudentDirectory, SchoolClass,
    Student,
};

use crate::builders::{class_roster, ClassBuilder};

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Creates a PKR amount
    pub fn pkr(amount: Decimal) -> Money {
        Money::new(amount, Currency::PKR)
    }

    /// Standard monthly tuition
    pub fn monthly_fee() -> Money {
        Self::pkr(dec!(3000))
    }

    pub fn pkr_zero() -> Money {
        Money::zero(Currency::PKR)
    }
}

/// Fixture for dates used across billing tests
pub struct DateFixtures;

impl DateFixtures {
    /// First of March 2025, the issue date of most test challans
    pub fn march_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    /// Any date in 2025
    pub fn on(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }
}

/// Fixture for caller identities
pub struct TenantFixtures;

impl TenantFixtures {
    /// A fresh staff member in a fresh school
    pub fn school() -> TenantContext {
        TenantContext::new(UserId::new_v7(), SchoolId::new_v7())
    }

    /// Another staff member of the same school
    pub fn colleague(ctx: &TenantContext) -> TenantContext {
        TenantContext::new(UserId::new_v7(), ctx.school_id)
    }
}

/// A billing service over in-process adapters with a pinned clock
pub struct BillingHarness {
    pub service: Arc<BillingService>,
    pub store: Arc<InMemoryBillingStore>,
    pub directory: Arc<InMemoryStudentDirectory>,
    pub clock: Arc<FixedClock>,
    pub ctx: TenantContext,
    pub class: SchoolClass,
}

impl BillingHarness {
    /// Creates a harness with one empty class, the clock on `today`
    pub fn new(today: NaiveDate) -> Self {
        Self::with_config(today, BillingConfig::default())
    }

    pub fn with_config(today: NaiveDate, config: BillingConfig) -> Self {
        let ctx = TenantFixtures::school();
        let class = ClassBuilder::new(ctx.school_id).build();
        let store = Arc::new(InMemoryBillingStore::new());
        let directory = Arc::new(InMemoryStudentDirectory::with_records(vec![class.clone()], vec![]));
        let clock = Arc::new(FixedClock::at_date(today));

        let service = BillingService::new(
            store.clone(),
            directory.clone(),
            clock.clone() as Arc<dyn Clock>,
            config,
        )
        .expect("test billing config is valid");

        Self {
            service: Arc::new(service),
            store,
            directory,
            clock,
            ctx,
            class,
        }
    }

    /// Adds students to the directory
    pub async fn enroll(&self, students: impl IntoIterator<Item = Student>) {
        for student in students {
            self.directory.upsert_student(student).await;
        }
    }

    /// Enrolls a roster of active and inactive students in the harness class
    pub async fn enroll_roster(&self, active: usize, inactive: usize) -> Vec<Student> {
        let roster = class_roster(&self.class, active, inactive);
        self.enroll(roster.clone()).await;
        roster
    }

    /// Moves "today" for every subsequent call
    pub fn advance_to(&self, date: NaiveDate) {
        self.clock.set_date(date);
    }
}
