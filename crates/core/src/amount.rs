//! Amount - Non-negative 9-decimal fixed-point amount
//!
//! All capital in the vault is held as an integer count of nano-units
//! (`1 unit == 1_000_000_000`). Negative values cannot be represented.
//! Arithmetic is checked; the upper bound keeps every amount exactly
//! representable as a `Decimal` for display and serialization.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fixed-point scale: one unit at 9 decimals.
pub const DECIMALS: u128 = 1_000_000_000;

/// Smallest accepted deposit (0.1 unit).
pub const MIN_DEPOSIT: Amount = Amount(100_000_000);

/// Largest nano value that still fits a `Decimal` mantissa (2^96 - 1).
const MAX_NANOS: u128 = (1u128 << 96) - 1;

/// Errors that can occur when working with amounts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount cannot be negative: {0}")]
    NegativeAmount(Decimal),

    #[error("Amount has more than 9 decimal places: {0}")]
    TooPrecise(Decimal),

    #[error("Amount out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid amount: {0}")]
    Parse(String),
}

/// A non-negative fixed-point amount with 9 implied decimals.
///
/// # Invariant
/// The inner value is always <= 2^96 - 1 nano-units.
///
/// # Example
/// ```
/// use tranchevault_core::Amount;
/// use rust_decimal::Decimal;
///
/// let amount = Amount::from_units(100);
/// assert_eq!(amount.nanos(), 100_000_000_000);
/// assert_eq!(amount.to_decimal(), Decimal::new(100, 0));
///
/// // Negative amounts are rejected
/// assert!(Amount::try_from(Decimal::new(-1, 0)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(u128);

impl Amount {
    /// Zero amount constant
    pub const ZERO: Self = Self(0);

    /// Largest representable amount
    pub const MAX: Self = Self(MAX_NANOS);

    /// Create an amount from a raw nano-unit count.
    pub fn new(nanos: u128) -> Result<Self, AmountError> {
        if nanos > MAX_NANOS {
            Err(AmountError::OutOfRange(nanos.to_string()))
        } else {
            Ok(Self(nanos))
        }
    }

    /// Create an amount from nano-units that always fit.
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos as u128)
    }

    /// Create an amount from whole units.
    #[inline]
    pub const fn from_units(units: u64) -> Self {
        Self(units as u128 * DECIMALS)
    }

    /// Raw nano-unit count
    #[inline]
    pub const fn nanos(&self) -> u128 {
        self.0
    }

    /// Check if the amount is zero
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Decimal view (`nanos / 10^9`), always exact
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from_i128_with_scale(self.0 as i128, 9).normalize()
    }

    /// Checked addition - returns None past `Amount::MAX`
    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        self.0
            .checked_add(other.0)
            .filter(|sum| *sum <= MAX_NANOS)
            .map(Amount)
    }

    /// Checked subtraction - returns None if result would be negative
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Subtraction clamped at zero
    pub fn saturating_sub(&self, other: &Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// `self * numerator / denominator`, rounded down.
    ///
    /// Returns None on a zero denominator or if the result leaves range.
    pub fn mul_div_floor(&self, numerator: u128, denominator: u128) -> Option<Amount> {
        if denominator == 0 {
            return None;
        }
        let product = self.0.checked_mul(numerator)?;
        Amount::new(product / denominator).ok()
    }

    /// `self * part / whole`, rounded down.
    ///
    /// Exact while the product fits in u128; past that the ratio is taken
    /// in `Decimal` first. Returns None on a zero `whole`.
    pub fn pro_rata(&self, part: Amount, whole: Amount) -> Option<Amount> {
        self.scale(part, whole, RoundingStrategy::ToZero)
    }

    /// `self * part / whole`, rounded up
    pub fn pro_rata_ceil(&self, part: Amount, whole: Amount) -> Option<Amount> {
        self.scale(part, whole, RoundingStrategy::ToPositiveInfinity)
    }

    fn scale(&self, part: Amount, whole: Amount, rounding: RoundingStrategy) -> Option<Amount> {
        if whole.is_zero() {
            return None;
        }
        match self.0.checked_mul(part.0) {
            Some(product) => {
                let mut quotient = product / whole.0;
                if rounding == RoundingStrategy::ToPositiveInfinity && product % whole.0 != 0 {
                    quotient += 1;
                }
                Amount::new(quotient).ok()
            }
            None => {
                let ratio = part.to_decimal().checked_div(whole.to_decimal())?;
                let value = self.to_decimal().checked_mul(ratio)?;
                Amount::try_from(value.round_dp_with_strategy(9, rounding)).ok()
            }
        }
    }

    /// Smaller of two amounts
    pub fn min(self, other: Amount) -> Amount {
        if self <= other {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::NegativeAmount(value));
        }
        let scaled = value
            .checked_mul(Decimal::from(DECIMALS as u64))
            .ok_or_else(|| AmountError::OutOfRange(value.to_string()))?;
        if !scaled.fract().is_zero() {
            return Err(AmountError::TooPrecise(value));
        }
        let nanos = scaled
            .to_u128()
            .ok_or_else(|| AmountError::OutOfRange(value.to_string()))?;
        Amount::new(nanos)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.to_decimal()
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|e| AmountError::Parse(e.to_string()))?;
        Amount::try_from(value)
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_units() {
        let amount = Amount::from_units(100);
        assert_eq!(amount.nanos(), 100 * DECIMALS);
        assert_eq!(amount.to_decimal(), Decimal::new(100, 0));
    }

    #[test]
    fn test_min_deposit_is_tenth_of_unit() {
        assert_eq!(MIN_DEPOSIT.to_decimal(), Decimal::new(1, 1));
    }

    #[test]
    fn test_negative_decimal_rejected() {
        let result = Amount::try_from(Decimal::new(-100, 0));
        assert!(matches!(result, Err(AmountError::NegativeAmount(_))));
    }

    #[test]
    fn test_too_precise_rejected() {
        // 10 decimal places
        let result = Amount::try_from(Decimal::new(1, 10));
        assert!(matches!(result, Err(AmountError::TooPrecise(_))));
    }

    #[test]
    fn test_parse_fractional() {
        let amount: Amount = "12.5".parse().unwrap();
        assert_eq!(amount.nanos(), 12_500_000_000);
        assert_eq!(amount.to_string(), "12.5");
    }

    #[test]
    fn test_checked_sub_prevents_negative() {
        let a = Amount::from_units(50);
        let b = Amount::from_units(100);
        assert!(a.checked_sub(&b).is_none());
        assert_eq!(a.saturating_sub(&b), Amount::ZERO);
    }

    #[test]
    fn test_checked_add_respects_max() {
        assert!(Amount::MAX.checked_add(&Amount::from_nanos(1)).is_none());
        assert_eq!(
            Amount::from_units(1).checked_add(&Amount::from_units(2)),
            Some(Amount::from_units(3))
        );
    }

    #[test]
    fn test_mul_div_floor() {
        let amount = Amount::from_nanos(1_000);
        assert_eq!(amount.mul_div_floor(1, 3), Some(Amount::from_nanos(333)));
        assert_eq!(amount.mul_div_floor(1, 0), None);
    }

    #[test]
    fn test_pro_rata_rounding() {
        let units = Amount::from_nanos(10);
        let capital = Amount::from_nanos(20);
        let outstanding = Amount::from_nanos(30);
        assert_eq!(units.pro_rata(capital, outstanding), Some(Amount::from_nanos(6)));
        assert_eq!(units.pro_rata_ceil(capital, outstanding), Some(Amount::from_nanos(7)));
        assert_eq!(units.pro_rata(capital, Amount::ZERO), None);

        // Exact division needs no rounding up
        let half = Amount::from_nanos(15);
        assert_eq!(half.pro_rata_ceil(capital, outstanding), Some(Amount::from_nanos(10)));
    }

    #[test]
    fn test_pro_rata_wide_operands() {
        // The product overflows u128; the share still comes out right
        let big = Amount::new(1u128 << 90).unwrap();
        let whole = Amount::new(1u128 << 91).unwrap();
        assert_eq!(big.pro_rata(big, whole), Some(Amount::new(1u128 << 89).unwrap()));
    }

    #[test]
    fn test_serde_as_decimal_string() {
        let amount: Amount = "123.45".parse().unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"123.45\"");
        let parsed: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(amount, parsed);
    }
}
