//! Money types with precise decimal arithmetic
//!
//! This module provides a type-safe representation of monetary values
//! using rust_decimal for precise calculations without floating-point errors.
//! Fee amounts, payments and balances all flow through [`Money`].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    PKR,
    INR,
    BDT,
    AED,
    SAR,
    USD,
    GBP,
    EUR,
}

impl Currency {
    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        2
    }

    /// Returns the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::PKR => "Rs",
            Currency::INR => "₹",
            Currency::BDT => "৳",
            Currency::AED => "AED",
            Currency::SAR => "SAR",
            Currency::USD => "$",
            Currency::GBP => "£",
            Currency::EUR => "€",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::PKR => "PKR",
            Currency::INR => "INR",
            Currency::BDT => "BDT",
            Currency::AED => "AED",
            Currency::SAR => "SAR",
            Currency::USD => "USD",
            Currency::GBP => "GBP",
            Currency::EUR => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PKR" => Ok(Currency::PKR),
            "INR" => Ok(Currency::INR),
            "BDT" => Ok(Currency::BDT),
            "AED" => Ok(Currency::AED),
            "SAR" => Ok(Currency::SAR),
            "USD" => Ok(Currency::USD),
            "GBP" => Ok(Currency::GBP),
            "EUR" => Ok(Currency::EUR),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),
}

/// A monetary amount with associated currency
///
/// Amounts are stored with 4 decimal places internally; use
/// [`Money::round_to_currency`] before persisting a computed fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: amount.round_dp(4),
            currency,
        }
    }

    /// Creates Money from an integer amount in minor units (e.g., paisa)
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self::new(Decimal::new(minor_units, currency.decimal_places()), currency)
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: dec!(0),
            currency,
        }
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is positive
    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    /// Returns true if the amount is negative
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Rounds to the currency's standard decimal places
    pub fn round_to_currency(&self) -> Self {
        Self {
            amount: self.amount.round_dp(self.currency.decimal_places()),
            currency: self.currency,
        }
    }

    /// Returns the smaller of two amounts in the same currency
    pub fn min(self, other: Money) -> Money {
        if other.amount < self.amount {
            other
        } else {
            self
        }
    }

    /// Checked addition that returns an error on currency mismatch
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    /// Checked subtraction that returns an error on currency mismatch
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(Self::new(self.amount - other.amount, self.currency))
    }

    /// Sums an iterator of amounts, starting from zero in `currency`
    pub fn sum<'a, I>(currency: Currency, items: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        items
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.decimal_places();
        write!(
            f,
            "{} {:.dp$}",
            self.currency.symbol(),
            self.amount,
            dp = dp as usize
        )
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.amount, self.currency)
    }
}

/// Represents a percentage rate (e.g., a fee discount)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// The rate as a decimal (e.g., 0.05 for 5%)
    value: Decimal,
}

impl Rate {
    /// Creates a rate from a decimal value (e.g., 0.05 for 5%)
    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Creates a rate from a percentage (e.g., 5.0 for 5%)
    pub fn from_percentage(percentage: Decimal) -> Self {
        Self {
            value: percentage / dec!(100),
        }
    }

    /// Returns true when the rate is within 0%..=100%
    pub fn is_proportion(&self) -> bool {
        self.value >= Decimal::ZERO && self.value <= Decimal::ONE
    }

    /// Applies this rate to a money amount
    pub fn apply(&self, money: &Money) -> Money {
        Money::new(money.amount() * self.value, money.currency())
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.value * dec!(100)).normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_creation() {
        let m = Money::new(dec!(3000.50), Currency::PKR);
        assert_eq!(m.amount(), dec!(3000.50));
        assert_eq!(m.currency(), Currency::PKR);
    }

    #[test]
    fn test_money_from_minor() {
        let m = Money::from_minor(300050, Currency::PKR);
        assert_eq!(m.amount(), dec!(3000.50));
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::new(dec!(3000.00), Currency::PKR);
        let b = Money::new(dec!(1000.00), Currency::PKR);

        assert_eq!(a.checked_add(&b).unwrap().amount(), dec!(4000.00));
        assert_eq!(a.checked_sub(&b).unwrap().amount(), dec!(2000.00));
        assert_eq!(a.min(b), b);
    }

    #[test]
    fn test_currency_mismatch() {
        let pkr = Money::new(dec!(100.00), Currency::PKR);
        let usd = Money::new(dec!(100.00), Currency::USD);

        let result = pkr.checked_add(&usd);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_sum() {
        let items = vec![
            Money::new(dec!(1000), Currency::PKR),
            Money::new(dec!(2000), Currency::PKR),
        ];
        let total = Money::sum(Currency::PKR, &items).unwrap();
        assert_eq!(total.amount(), dec!(3000));
        assert!(!Money::zero(Currency::PKR).is_negative());
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!("pkr".parse::<Currency>().unwrap(), Currency::PKR);
        assert!("XYZ".parse::<Currency>().is_err());
    }

    #[test]
    fn test_discount_rate_application() {
        let rate = Rate::from_percentage(dec!(10));
        let fee = Money::new(dec!(3000.00), Currency::PKR);

        let discount = rate.apply(&fee);
        assert_eq!(discount.amount(), dec!(300.00));
        assert!(rate.is_proportion());
        assert!(!Rate::from_percentage(dec!(120)).is_proportion());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn money_sum_matches_decimal_sum(
            amounts in proptest::collection::vec(1i64..10_000_000i64, 0..50)
        ) {
            let items: Vec<Money> = amounts
                .iter()
                .map(|a| Money::from_minor(*a, Currency::PKR))
                .collect();
            let total = Money::sum(Currency::PKR, &items).unwrap();
            let expected: Decimal = items.iter().map(|m| m.amount()).sum();
            prop_assert_eq!(total.amount(), expected);
        }

        #[test]
        fn money_arithmetic_is_associative(
            a in -1_000_000i64..1_000_000i64,
            b in -1_000_000i64..1_000_000i64,
            c in -1_000_000i64..1_000_000i64
        ) {
            let ma = Money::from_minor(a, Currency::PKR);
            let mb = Money::from_minor(b, Currency::PKR);
            let mc = Money::from_minor(c, Currency::PKR);

            let left = ma.checked_add(&mb).and_then(|ab| ab.checked_add(&mc)).unwrap();
            let right = mb.checked_add(&mc).and_then(|bc| ma.checked_add(&bc)).unwrap();
            prop_assert_eq!(left, right);
        }
    }
}
