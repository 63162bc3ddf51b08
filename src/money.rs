use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, Result};

/// Number of fractional digits carried by every stored balance and amount.
pub const SCALE: u32 = 2;

/// Balances and amounts are decimal(20,2): at most 18 integer digits.
pub const INTEGER_DIGITS: u32 = 18;

/// True when `value` fits the decimal(20,2) column.
pub fn in_range(value: Decimal) -> bool {
    value.abs().trunc() < Decimal::from(10_i64.pow(INTEGER_DIGITS))
}

fn valid_precision(value: Decimal) -> bool {
    value.normalize().scale() <= SCALE && in_range(value)
}

/// A strictly positive monetary amount with at most two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO || !valid_precision(value) {
            return Err(LedgerError::InvalidAmount(value.to_string()));
        }
        Ok(Self(rescale(value)))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validates an opening balance: zero is allowed, negatives are not.
pub fn opening_balance(value: Decimal) -> Result<Decimal> {
    if value < Decimal::ZERO || !valid_precision(value) {
        return Err(LedgerError::InvalidAmount(value.to_string()));
    }
    Ok(rescale(value))
}

/// `current + delta`, refusing results outside the column's range.
pub fn checked_balance(current: Decimal, delta: Decimal) -> Result<Decimal> {
    current
        .checked_add(delta)
        .filter(|sum| in_range(*sum))
        .map(rescale)
        .ok_or(LedgerError::BalanceLimitExceeded)
}

/// Sum of `values` without panicking on overflow.
pub fn checked_total<I>(values: I) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, |acc, value| {
        acc.checked_add(value).ok_or(LedgerError::BalanceLimitExceeded)
    })
}

pub fn rescale(mut value: Decimal) -> Decimal {
    value.rescale(SCALE);
    value
}

/// Canonical column text for a decimal, always two fractional digits.
pub fn to_column(value: Decimal) -> String {
    rescale(value).to_string()
}

pub fn from_column(table: &'static str, text: &str) -> Result<Decimal> {
    Decimal::from_str(text)
        .map(rescale)
        .map_err(|e| LedgerError::corrupt(table, format!("invalid decimal '{text}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(Amount::new(dec!(0.01)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(dec!(1.005)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_trailing_zeros_are_not_extra_precision() {
        let amount = Amount::new(dec!(10.5000)).unwrap();
        assert_eq!(amount.value(), dec!(10.50));
        assert_eq!(amount.to_string(), "10.50");
    }

    #[test]
    fn test_amounts_are_capped_at_eighteen_integer_digits() {
        let largest = dec!(999999999999999999.99);
        assert_eq!(Amount::new(largest).unwrap().value(), largest);
        assert_eq!(opening_balance(largest).unwrap(), largest);

        let too_big = dec!(1000000000000000000);
        assert!(matches!(
            Amount::new(too_big),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            opening_balance(too_big),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(Decimal::MAX),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_checked_balance() {
        assert_eq!(checked_balance(dec!(10.00), dec!(-2.5)).unwrap(), dec!(7.50));
        assert_eq!(checked_balance(dec!(10.00), dec!(-2.5)).unwrap().scale(), SCALE);
        assert!(matches!(
            checked_balance(dec!(999999999999999999.99), dec!(0.01)),
            Err(LedgerError::BalanceLimitExceeded)
        ));
        assert!(matches!(
            checked_balance(Decimal::MAX, dec!(1)),
            Err(LedgerError::BalanceLimitExceeded)
        ));
    }

    #[test]
    fn test_checked_total() {
        assert_eq!(checked_total(Vec::new()).unwrap(), Decimal::ZERO);
        assert_eq!(checked_total([dec!(1.10), dec!(2.90)]).unwrap(), dec!(4.00));
        assert!(matches!(
            checked_total([Decimal::MAX, dec!(1)]),
            Err(LedgerError::BalanceLimitExceeded)
        ));
    }

    #[test]
    fn test_opening_balance() {
        assert_eq!(opening_balance(dec!(0)).unwrap(), dec!(0.00));
        assert!(opening_balance(dec!(-0.01)).is_err());
    }

    #[test]
    fn test_column_text_is_canonical() {
        assert_eq!(to_column(dec!(1000)), "1000.00");
        assert_eq!(to_column(dec!(0.5)), "0.50");
        assert_eq!(from_column("cards", "700.00").unwrap(), dec!(700.00));
        assert!(matches!(
            from_column("cards", "seven"),
            Err(LedgerError::CorruptRow { table: "cards", .. })
        ));
    }
}
