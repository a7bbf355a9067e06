//! Students and classes as seen by billing
//!
//! The student directory owns these records; billing only reads them to
//! decide what each student owes for a period.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{ClassId, Money, Rate, SchoolId, StudentId};

use crate::error::BillingError;
use crate::period::FeePlan;

/// Enrollment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Active,
    Inactive,
}

/// A student with their billing terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub school_id: SchoolId,
    pub name: String,
    pub class_id: ClassId,
    pub fee_plan: FeePlan,
    /// Fee per billing period before discount
    pub base_fee: Money,
    /// Discount percentage, 0-100
    pub discount_percent: Decimal,
    pub status: StudentStatus,
}

impl Student {
    /// Creates an active student with no discount
    pub fn new(
        school_id: SchoolId,
        class_id: ClassId,
        name: impl Into<String>,
        fee_plan: FeePlan,
        base_fee: Money,
    ) -> Self {
        Self {
            id: StudentId::new_v7(),
            school_id,
            name: name.into(),
            class_id,
            fee_plan,
            base_fee,
            discount_percent: Decimal::ZERO,
            status: StudentStatus::Active,
        }
    }

    pub fn with_discount(mut self, percent: Decimal) -> Self {
        self.discount_percent = percent;
        self
    }

    pub fn with_status(mut self, status: StudentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == StudentStatus::Active
    }

    pub fn discount_rate(&self) -> Rate {
        Rate::from_percentage(self.discount_percent)
    }

    /// Discount amount for one period, rounded to the currency
    pub fn discount(&self) -> Money {
        self.discount_rate().apply(&self.base_fee).round_to_currency()
    }

    /// Fee owed for one period after discount
    pub fn final_fee(&self) -> Result<Money, BillingError> {
        self.validate_terms()?;
        let base = self.base_fee.round_to_currency();
        Ok(base.checked_sub(&self.discount())?)
    }

    /// Checks the fee and discount are within range
    pub fn validate_terms(&self) -> Result<(), BillingError> {
        if self.base_fee.is_negative() {
            return Err(BillingError::validation(format!(
                "student {} has a negative base fee",
                self.id
            )));
        }
        if !self.discount_rate().is_proportion() {
            return Err(BillingError::validation(format!(
                "student {} has discount {}% outside 0-100",
                self.id, self.discount_percent
            )));
        }
        Ok(())
    }
}

/// A class (grade/section) students are enrolled in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolClass {
    pub id: ClassId,
    pub school_id: SchoolId,
    pub name: String,
}

impl SchoolClass {
    pub fn new(school_id: SchoolId, name: impl Into<String>) -> Self {
        Self {
            id: ClassId::new_v7(),
            school_id,
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn student(fee: Decimal, discount: Decimal) -> Student {
        Student::new(
            SchoolId::new(),
            ClassId::new(),
            "Ayesha Khan",
            FeePlan::Monthly,
            Money::new(fee, Currency::PKR),
        )
        .with_discount(discount)
    }

    #[test]
    fn test_final_fee_without_discount() {
        let s = student(dec!(3000), Decimal::ZERO);
        assert_eq!(s.final_fee().unwrap().amount(), dec!(3000));
        assert!(s.discount().is_zero());
    }

    #[test]
    fn test_final_fee_with_discount() {
        let s = student(dec!(3000), dec!(10));
        assert_eq!(s.discount().amount(), dec!(300));
        assert_eq!(s.final_fee().unwrap().amount(), dec!(2700));
    }

    #[test]
    fn test_discount_rounds_to_paisa() {
        let s = student(dec!(2500), dec!(12.5));
        assert_eq!(s.discount().amount(), dec!(312.50));
        let s = student(dec!(1000), dec!(33.333));
        assert_eq!(s.discount().amount(), dec!(333.33));
        assert_eq!(s.final_fee().unwrap().amount(), dec!(666.67));
    }

    #[test]
    fn test_full_scholarship_is_zero_fee() {
        let s = student(dec!(3000), dec!(100));
        assert!(s.final_fee().unwrap().is_zero());
    }

    #[test]
    fn test_invalid_discount_rejected() {
        assert!(matches!(
            student(dec!(3000), dec!(120)).final_fee(),
            Err(BillingError::Validation(_))
        ));
        assert!(student(dec!(3000), dec!(-5)).final_fee().is_err());
        assert!(student(dec!(-1), Decimal::ZERO).final_fee().is_err());
    }
}
