//! Unit tests for the Money module
//!
//! Tests cover money creation, arithmetic, rounding, discount rates
//! and currency handling.

use core_kernel::{Money, Currency, MoneyError, Rate};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_rounds_to_four_decimal_places() {
        let m = Money::new(dec!(100.123456789), Currency::PKR);
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(Currency::PKR);
        assert!(m.is_zero());
        assert!(!m.is_positive());
        assert!(!m.is_negative());
    }

    #[test]
    fn test_round_to_currency() {
        let m = Money::new(dec!(2666.6667), Currency::PKR);
        assert_eq!(m.round_to_currency().amount(), dec!(2666.67));
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_sub_mismatch() {
        let pkr = Money::new(dec!(10), Currency::PKR);
        let inr = Money::new(dec!(10), Currency::INR);
        assert_eq!(
            pkr.checked_sub(&inr),
            Err(MoneyError::CurrencyMismatch("PKR".to_string(), "INR".to_string()))
        );
    }

    #[test]
    fn test_negation() {
        let m = Money::new(dec!(300), Currency::PKR);
        assert_eq!((-m).amount(), dec!(-300));
        assert!((-m).is_negative());
    }

    #[test]
    fn test_sum_rejects_mixed_currencies() {
        let items = [
            Money::new(dec!(1), Currency::PKR),
            Money::new(dec!(1), Currency::USD),
        ];
        assert!(Money::sum(Currency::PKR, &items).is_err());
    }

    #[test]
    fn test_checked_add_mismatch_is_an_error() {
        let result = Money::new(dec!(1), Currency::PKR).checked_add(&Money::new(dec!(1), Currency::GBP));
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch(_, _))));
    }
}

mod rates {
    use super::*;

    #[test]
    fn test_discount_of_fee() {
        let base = Money::new(dec!(3500), Currency::PKR);
        let discount = Rate::from_percentage(dec!(20)).apply(&base);
        assert_eq!(base.checked_sub(&discount).unwrap().amount(), dec!(2800));
    }

    #[test]
    fn test_rate_display() {
        assert_eq!(Rate::from_percentage(dec!(12.5)).to_string(), "12.5%");
    }
}

mod display {
    use super::*;

    #[test]
    fn test_display_uses_symbol_and_two_places() {
        let m = Money::new(dec!(3000), Currency::PKR);
        assert_eq!(m.to_string(), "Rs 3000.00");
    }
}
