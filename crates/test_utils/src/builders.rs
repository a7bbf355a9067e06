//! Test Data Builders
//!
//! Provides builder patterns for constructing students and classes with
//! sensible defaults. Tests set only the fields they care about.

use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{ClassId, Currency, Money, SchoolId, StudentId};
use domain_billing::{FeePlan, SchoolClass, Student, StudentStatus};

/// Builder for constructing test students
///
/// Defaults to an active monthly student paying Rs 3000 with no discount
/// and a random name.
pub struct StudentBuilder {
    id: StudentId,
    school_id: SchoolId,
    class_id: ClassId,
    name: String,
    fee_plan: FeePlan,
    base_fee: Decimal,
    currency: Currency,
    discount_percent: Decimal,
    status: StudentStatus,
}

impl StudentBuilder {
    /// Creates a new builder for a student in the given class
    pub fn new(school_id: SchoolId, class_id: ClassId) -> Self {
        Self {
            id: StudentId::new_v7(),
            school_id,
            class_id,
            name: Name().fake(),
            fee_plan: FeePlan::Monthly,
            base_fee: dec!(3000),
            currency: Currency::PKR,
            discount_percent: Decimal::ZERO,
            status: StudentStatus::Active,
        }
    }

    /// Creates a builder for a student of `class`
    pub fn in_class(class: &SchoolClass) -> Self {
        Self::new(class.school_id, class.id)
    }

    pub fn with_id(mut self, id: StudentId) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_plan(mut self, plan: FeePlan) -> Self {
        self.fee_plan = plan;
        self
    }

    /// Sets the per-period base fee
    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.base_fee = fee;
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Sets the discount percentage (0-100)
    pub fn with_discount(mut self, percent: Decimal) -> Self {
        self.discount_percent = percent;
        self
    }

    /// Marks the student inactive
    pub fn inactive(mut self) -> Self {
        self.status = StudentStatus::Inactive;
        self
    }

    /// Builds the student
    pub fn build(self) -> Student {
        Student {
            id: self.id,
            school_id: self.school_id,
            name: self.name,
            class_id: self.class_id,
            fee_plan: self.fee_plan,
            base_fee: Money::new(self.base_fee, self.currency),
            discount_percent: self.discount_percent,
            status: self.status,
        }
    }
}

/// Builder for constructing test classes
pub struct ClassBuilder {
    school_id: SchoolId,
    name: String,
}

impl ClassBuilder {
    pub fn new(school_id: SchoolId) -> Self {
        Self {
            school_id,
            name: "Grade 5-A".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn build(self) -> SchoolClass {
        SchoolClass::new(self.school_id, self.name)
    }
}

/// Builds `active` active and `inactive` inactive students for a class
pub fn class_roster(class: &SchoolClass, active: usize, inactive: usize) -> Vec<Student> {
    let active_students = (0..active).map(|i| {
        StudentBuilder::in_class(class)
            .with_name(format!("Active Student {:02}", i + 1))
            .build()
    });
    let inactive_students = (0..inactive).map(|i| {
        StudentBuilder::in_class(class)
            .with_name(format!("Inactive Student {:02}", i + 1))
            .inactive()
            .build()
    });
    active_students.chain(inactive_students).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_builder_defaults() {
        let class = ClassBuilder::new(SchoolId::new()).build();
        let student = StudentBuilder::in_class(&class).build();

        assert!(!student.name.is_empty());
        assert!(student.is_active());
        assert_eq!(student.class_id, class.id);
        assert_eq!(student.final_fee().unwrap().amount(), dec!(3000));
    }

    #[test]
    fn test_class_roster() {
        let class = ClassBuilder::new(SchoolId::new()).build();
        let roster = class_roster(&class, 3, 2);
        assert_eq!(roster.len(), 5);
        assert_eq!(roster.iter().filter(|s| s.is_active()).count(), 3);
    }
}
