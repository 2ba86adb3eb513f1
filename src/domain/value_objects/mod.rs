//! Value Objects for settlement

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Money in integer minor currency units (cents).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn cents(minor: u32) -> Self { Self(minor as i64) }

    pub fn from_minor(minor: i64) -> Result<Self, MoneyError> {
        if minor < 0 { return Err(MoneyError::Negative); }
        Ok(Self(minor))
    }

    /// Converts a major-unit decimal ("4.99") to minor units, rounding half up.
    /// This is the only place a fractional amount is rounded.
    pub fn from_major(amount: Decimal) -> Result<Self, MoneyError> {
        let minor = (amount * Decimal::ONE_HUNDRED).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Self::from_minor(minor.to_i64().ok_or(MoneyError::Overflow)?)
    }

    /// Rounds a fractional minor-unit amount half up.
    pub fn from_fractional_minor(minor: Decimal) -> Result<Self, MoneyError> {
        let rounded = minor.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Self::from_minor(rounded.to_i64().ok_or(MoneyError::Overflow)?)
    }

    pub fn minor(&self) -> i64 { self.0 }
    pub fn to_major(&self) -> Decimal { Decimal::new(self.0, 2) }

    pub fn checked_add(self, other: Money) -> Result<Money, MoneyError> {
        self.0.checked_add(other.0).map(Money).ok_or(MoneyError::Overflow)
    }

    pub fn checked_sub(self, other: Money) -> Result<Money, MoneyError> {
        match self.0.checked_sub(other.0) {
            Some(v) if v >= 0 => Ok(Money(v)),
            Some(_) => Err(MoneyError::Negative),
            None => Err(MoneyError::Overflow),
        }
    }

    pub fn checked_mul(self, qty: u32) -> Result<Money, MoneyError> {
        self.0.checked_mul(i64::from(qty)).map(Money).ok_or(MoneyError::Overflow)
    }

    pub fn min(self, other: Money) -> Money { if self.0 <= other.0 { self } else { other } }
}

impl TryFrom<i64> for Money {
    type Error = MoneyError;
    fn try_from(minor: i64) -> Result<Self, Self::Error> { Self::from_minor(minor) }
}

impl From<Money> for i64 {
    fn from(m: Money) -> i64 { m.0 }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.to_major()) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { Negative, Overflow }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Negative => write!(f, "Negative amount"), Self::Overflow => write!(f, "Amount overflow") }
    }
}

/// Quantity value object, always at least one unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 { return Err(QuantityError::Zero); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> u32 { q.0 }
}

#[derive(Debug, Clone)] pub enum QuantityError { Zero }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Quantity must be at least 1") }
}

/// Coupon discount percentage, 1 to 99 inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DiscountPercent(u8);

impl DiscountPercent {
    pub fn new(value: u8) -> Result<Self, PercentError> {
        if !(1..=99).contains(&value) { return Err(PercentError::OutOfRange(value)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u8 { self.0 }
}

impl TryFrom<u8> for DiscountPercent {
    type Error = PercentError;
    fn try_from(value: u8) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<DiscountPercent> for u8 {
    fn from(p: DiscountPercent) -> u8 { p.0 }
}

#[derive(Debug, Clone)] pub enum PercentError { OutOfRange(u8) }
impl std::error::Error for PercentError {}
impl fmt::Display for PercentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::OutOfRange(v) => write!(f, "Discount percent {} outside 1-99", v) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_major_rounds_half_up() {
        assert_eq!(Money::from_major(Decimal::new(499, 2)).unwrap().minor(), 499);
        assert_eq!(Money::from_major(Decimal::new(12345, 3)).unwrap().minor(), 1235);
        assert_eq!(Money::from_major(Decimal::new(12344, 3)).unwrap().minor(), 1234);
    }

    #[test]
    fn test_money_rejects_negative() {
        assert_eq!(Money::from_minor(-1), Err(MoneyError::Negative));
        assert_eq!(Money::from_minor(5).unwrap().checked_sub(Money::from_minor(6).unwrap()), Err(MoneyError::Negative));
    }

    #[test]
    fn test_money_to_major() { assert_eq!(Money::from_minor(1000).unwrap().to_major().to_string(), "10.00"); }

    #[test]
    fn test_quantity() { assert!(Quantity::new(0).is_err()); assert_eq!(Quantity::new(3).unwrap().value(), 3); }

    #[test]
    fn test_percent_bounds() {
        assert!(DiscountPercent::new(0).is_err());
        assert!(DiscountPercent::new(100).is_err());
        assert_eq!(DiscountPercent::new(99).unwrap().value(), 99);
    }
}
