//! Property-Based Test Generators
//!
//! Provides proptest strategies for fees, discounts, plans and payment
//! splits that respect the billing invariants.

use proptest::prelude::*;
use rust_decimal::Decimal;

use domain_billing::{FeePlan, PaymentMethod};

/// Strategy for per-period fees between Rs 100.00 and Rs 100,000.00
pub fn fee_strategy() -> impl Strategy<Value = Decimal> {
    (10_000i64..10_000_000i64).prop_map(|paisa| Decimal::new(paisa, 2))
}

/// Strategy for discount percentages from 0% to 100% in 0.5% steps
pub fn discount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=200i64).prop_map(|halves| Decimal::new(halves * 5, 1))
}

pub fn fee_plan_strategy() -> impl Strategy<Value = FeePlan> {
    prop_oneof![
        Just(FeePlan::Monthly),
        Just(FeePlan::Quarterly),
        Just(FeePlan::Annual),
    ]
}

pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::BankTransfer),
        Just(PaymentMethod::Cheque),
        Just(PaymentMethod::Card),
        Just(PaymentMethod::Online),
    ]
}

/// Strategy for a valid (month, year) billing target
pub fn month_year_strategy() -> impl Strategy<Value = (u32, i32)> {
    (1u32..=12, 2000i32..=2200)
}

/// Strategy for payment attempts against a challan, in paisa
///
/// Attempts may add up to more than any given total, so tests can check
/// that overpaying attempts are rejected.
pub fn payment_attempts_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..200_000i64, 1..8)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_fee_strategy_has_two_decimals(fee in fee_strategy()) {
            prop_assert!(fee >= Decimal::new(100, 0));
            prop_assert_eq!(fee.round_dp(2), fee);
        }

        #[test]
        fn test_discount_strategy_in_range(discount in discount_strategy()) {
            prop_assert!(discount >= Decimal::ZERO);
            prop_assert!(discount <= Decimal::ONE_HUNDRED);
        }
    }
}
