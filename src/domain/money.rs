use crate::error::{IntakeError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

/// A monetary value (unit price, subtotal or order total).
///
/// Wraps `rust_decimal::Decimal` so prices never go through binary floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Mul<Quantity> for Money {
    type Output = Self;
    fn mul(self, rhs: Quantity) -> Self::Output {
        Self(self.0 * Decimal::from(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

/// A strictly positive line quantity.
///
/// Repeated merges accumulate up to [`Quantity::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(u32);

impl Quantity {
    pub const MAX: Quantity = Quantity(u32::MAX);

    pub fn new(value: i64) -> Result<Self> {
        if value <= 0 {
            return Err(IntakeError::validation("quantity must be positive"));
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| IntakeError::validation("quantity is too large"))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Merges another quantity into this one.
    pub fn merge(self, other: Quantity) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(|| IntakeError::validation("quantity is too large"))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = IntakeError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(quantity: Quantity) -> Self {
        i64::from(quantity.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_arithmetic() {
        let unit = Money::new(dec!(8.08));
        let qty = Quantity::new(5).unwrap();
        assert_eq!(unit * qty, Money::new(dec!(40.40)));

        let total: Money = vec![Money::new(dec!(1.10)), Money::new(dec!(2.20))]
            .into_iter()
            .sum();
        assert_eq!(total, Money::new(dec!(3.30)));
    }

    #[test]
    fn test_quantity_validation() {
        assert!(Quantity::new(1).is_ok());
        assert!(matches!(
            Quantity::new(0),
            Err(IntakeError::ValidationError(_))
        ));
        assert!(matches!(
            Quantity::new(-3),
            Err(IntakeError::ValidationError(_))
        ));
    }

    #[test]
    fn test_quantity_merge() {
        let merged = Quantity::new(2)
            .unwrap()
            .merge(Quantity::new(3).unwrap())
            .unwrap();
        assert_eq!(merged.value(), 5);
    }

    #[test]
    fn test_quantity_rejects_non_positive_json() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("4").unwrap().value(), 4);
    }
}
