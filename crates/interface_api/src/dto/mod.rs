//! Request and response bodies
//!
//! Money leaves the API as a string with two decimals so clients never
//! round-trip amounts through floating point.

pub mod challans;
pub mod payments;
pub mod reports;

use core_kernel::Money;
use rust_decimal::Decimal;

/// Formats an amount with two decimal places
pub fn amount(value: Decimal) -> String {
    format!("{:.2}", value)
}

/// Formats a [`Money`] amount with two decimal places
pub fn money(value: &Money) -> String {
    amount(value.amount())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_formats_two_decimals() {
        assert_eq!(money(&Money::new(dec!(3000), Currency::PKR)), "3000.00");
        assert_eq!(amount(dec!(12.5)), "12.50");
    }

    proptest! {
        #[test]
        fn prop_amounts_always_carry_two_decimals(minor in 0i64..10_000_000_000) {
            let formatted = money(&Money::from_minor(minor, Currency::PKR));
            let (whole, fraction) = formatted.split_once('.').unwrap();
            prop_assert_eq!(fraction.len(), 2);
            prop_assert_eq!(format!("{whole}{fraction}").parse::<i64>().unwrap(), minor);
        }
    }
}
