//! Curve errors

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurveError {
    #[error("Unknown curve id: {0}")]
    UnknownCurve(u8),

    #[error("APY bounds inverted: min {min_bps} bps > max {max_bps} bps")]
    InvertedBounds { min_bps: u32, max_bps: u32 },

    #[error("APY {0} bps exceeds the 100000 bps ceiling")]
    ApyTooHigh(u32),

    #[error("{0} curve requires a NAV cap")]
    MissingCap(&'static str),

    #[error("NAV cap must be at least 1.0, got {0}")]
    CapBelowPar(Decimal),
}
