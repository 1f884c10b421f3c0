//! TrancheId - The six risk tranches
//!
//! Ids 1-6 map to BTC, SNR, MEZZ, JNR, JNR_PLUS, EQT. A lower id is more
//! senior: BTC is paid last in a loss, EQT first.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Errors that can occur when resolving a tranche id
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrancheIdError {
    #[error("Unknown tranche id: {0} (expected 1-6)")]
    UnknownId(u8),
}

/// Risk tranche identifier
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TrancheId {
    /// Fixed-coupon, most senior
    Btc = 1,
    /// Senior
    Snr = 2,
    /// Mezzanine
    Mezz = 3,
    /// Junior
    Jnr = 4,
    /// Junior plus
    JnrPlus = 5,
    /// Equity, first loss
    Eqt = 6,
}

impl TrancheId {
    /// All tranches, most senior first.
    pub const ALL: [TrancheId; 6] = [
        TrancheId::Btc,
        TrancheId::Snr,
        TrancheId::Mezz,
        TrancheId::Jnr,
        TrancheId::JnrPlus,
        TrancheId::Eqt,
    ];

    /// Loss absorption order, most junior first.
    pub const WATERFALL: [TrancheId; 6] = [
        TrancheId::Eqt,
        TrancheId::JnrPlus,
        TrancheId::Jnr,
        TrancheId::Mezz,
        TrancheId::Snr,
        TrancheId::Btc,
    ];

    /// Numeric id (1-6)
    #[inline]
    pub const fn id(&self) -> u8 {
        *self as u8
    }

    /// Zero-based slot for fixed-size tables
    #[inline]
    pub const fn index(&self) -> usize {
        (*self as u8 - 1) as usize
    }
}

impl TryFrom<u8> for TrancheId {
    type Error = TrancheIdError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(TrancheId::Btc),
            2 => Ok(TrancheId::Snr),
            3 => Ok(TrancheId::Mezz),
            4 => Ok(TrancheId::Jnr),
            5 => Ok(TrancheId::JnrPlus),
            6 => Ok(TrancheId::Eqt),
            other => Err(TrancheIdError::UnknownId(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_one_based() {
        assert_eq!(TrancheId::Btc.id(), 1);
        assert_eq!(TrancheId::Eqt.id(), 6);
        assert_eq!(TrancheId::Eqt.index(), 5);
    }

    #[test]
    fn test_try_from_u8() {
        assert_eq!(TrancheId::try_from(3).unwrap(), TrancheId::Mezz);
        assert_eq!(TrancheId::try_from(0), Err(TrancheIdError::UnknownId(0)));
        assert_eq!(TrancheId::try_from(7), Err(TrancheIdError::UnknownId(7)));
    }

    #[test]
    fn test_waterfall_is_reverse_seniority() {
        let mut reversed = TrancheId::ALL;
        reversed.reverse();
        assert_eq!(reversed, TrancheId::WATERFALL);
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(TrancheId::JnrPlus.to_string(), "JNR_PLUS");
        assert_eq!("jnr_plus".parse::<TrancheId>().unwrap(), TrancheId::JnrPlus);
        assert_eq!("EQT".parse::<TrancheId>().unwrap(), TrancheId::Eqt);
    }

    #[test]
    fn test_serde_name() {
        let json = serde_json::to_string(&TrancheId::Mezz).unwrap();
        assert_eq!(json, "\"MEZZ\"");
    }
}
