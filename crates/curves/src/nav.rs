//! Nav - Fixed-point NAV multiplier
//!
//! `Nav::ONE` (1_000_000_000) represents a multiplier of 1.0, matching the
//! vault's 9-decimal amount scale.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

const SCALE: u64 = 1_000_000_000;

/// NAV multiplier at 9 decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nav(u64);

impl Nav {
    /// Multiplier of exactly 1.0
    pub const ONE: Self = Self(SCALE);

    /// Wrap a raw 9-decimal value
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw 9-decimal value
    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Convert a decimal multiplier, truncating past 9 decimals.
    ///
    /// Negative input clamps to zero and values past `u64` saturate.
    pub fn from_decimal(value: Decimal) -> Self {
        if value.is_sign_negative() {
            return Self(0);
        }
        let scaled = value
            .checked_mul(Decimal::from(SCALE))
            .map(|d| d.trunc())
            .and_then(|d| d.to_u64())
            .unwrap_or(u64::MAX);
        Self(scaled)
    }

    /// Decimal view of the multiplier
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0 as i64, 9).normalize()
    }
}

impl fmt::Display for Nav {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_decimal_truncates() {
        assert_eq!(Nav::from_decimal(dec!(1.0400000009)).raw(), 1_040_000_000);
    }

    #[test]
    fn test_negative_clamps_to_zero() {
        assert_eq!(Nav::from_decimal(dec!(-0.5)).raw(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Nav::ONE.to_string(), "1");
        assert_eq!(Nav::from_raw(1_040_000_000).to_string(), "1.04");
    }
}
