//! TrancheVault NAV Curves
//!
//! Maps a tranche's curve parameters and elapsed time to a net-asset-value
//! multiplier. Everything here is pure: no state, no clock, no I/O.
//! Decimal arithmetic keeps results identical across platforms.

pub mod curve;
pub mod error;
pub mod nav;

pub use curve::{years_between, CurveParams, CurveType, MAX_HORIZON_YEARS, SECONDS_PER_YEAR};
pub use error::CurveError;
pub use nav::Nav;
