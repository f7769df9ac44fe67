use crate::error::EngineError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fractional digits carried by every amount.
pub const MONEY_SCALE: u32 = 3;

/// A non-negative fixed-point amount with three fractional digits.
///
/// Wraps `rust_decimal::Decimal` so that amounts compare by exact value and
/// never pass through floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, EngineError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(EngineError::Validation(format!(
                "Amount must not be negative: {value}"
            )));
        }
        if value.normalize().scale() > MONEY_SCALE {
            return Err(EngineError::Validation(format!(
                "Amount has more than {MONEY_SCALE} fractional digits: {value}"
            )));
        }
        let mut value = value;
        value.rescale(MONEY_SCALE);
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Multiplies a unit price by a quantity.
    pub fn times(&self, quantity: u32) -> Result<Self, EngineError> {
        let mut value = self
            .0
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(out_of_range)?;
        value.rescale(MONEY_SCALE);
        Ok(Self(value))
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, EngineError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or_else(out_of_range)
    }
}

fn out_of_range() -> EngineError {
    EngineError::Validation("amount out of range".to_string())
}

impl TryFrom<Decimal> for Money {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl PartialEq<Decimal> for Money {
    fn eq(&self, other: &Decimal) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_is_rescaled_to_three_digits() {
        let money = Money::new(dec!(125)).unwrap();
        assert_eq!(money.to_string(), "125.000");
        assert_eq!(money, dec!(125.0));
    }

    #[test]
    fn test_money_validation() {
        assert!(Money::new(dec!(0)).is_ok());
        assert!(Money::new(dec!(0.001)).is_ok());
        assert!(matches!(
            Money::new(dec!(-0.5)),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            Money::new(dec!(1.0005)),
            Err(EngineError::Validation(_))
        ));
        // Trailing zeros beyond the scale are not extra precision.
        assert!(Money::new(dec!(1.50000)).is_ok());
    }

    #[test]
    fn test_money_arithmetic() {
        let price = Money::new(dec!(50.00)).unwrap();
        assert_eq!(price.times(2).unwrap(), Money::new(dec!(100)).unwrap());

        let total = price
            .times(2)
            .unwrap()
            .checked_add(Money::new(dec!(25)).unwrap())
            .unwrap();
        assert_eq!(total.to_string(), "125.000");
    }

    #[test]
    fn test_money_overflow_is_validation_error() {
        let huge = Money::new(Decimal::MAX).unwrap();
        assert!(matches!(
            huge.times(2),
            Err(EngineError::Validation(ref msg)) if msg == "amount out of range"
        ));
        assert!(matches!(
            huge.checked_add(huge),
            Err(EngineError::Validation(_))
        ));
        let price = Money::new(dec!(100000000000000000000)).unwrap();
        assert!(price.times(4_000_000_000).is_err());
    }

    #[test]
    fn test_money_serde() {
        let money: Money = serde_json::from_str("\"19.990\"").unwrap();
        assert_eq!(money, dec!(19.99));
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"19.990\"");
        assert!(serde_json::from_str::<Money>("\"-1\"").is_err());
    }
}
