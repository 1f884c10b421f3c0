//! Curve definitions and evaluation
//!
//! Every curve starts at 1.0 and is non-decreasing in elapsed time:
//!
//! | Curve              | Tranche  | NAV(t)                                   |
//! |--------------------|----------|------------------------------------------|
//! | Flat               | BTC      | 1 + min * t                              |
//! | Logarithmic        | SNR      | 1 + apy(t) * t, apy -> max as ln(1+t)    |
//! | Linear             | MEZZ     | 1 + max * t                              |
//! | Sigmoidal          | JNR      | 1 + apy(t) * t, apy -> max as tanh(t/2)  |
//! | Quadratic          | JNR_PLUS | 1 + apy(t) * t, apy = max from year 1    |
//! | CappedExponential  | EQT      | min((1 + min)^t, cap)                    |
//!
//! For the blended curves the effective APY moves from `apy_min` towards
//! `apy_max` and never passes it.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::CurveError;
use crate::nav::Nav;

/// Seconds in a 365-day year
pub const SECONDS_PER_YEAR: i64 = 31_536_000;

/// Elapsed time is clamped to this many years so every curve stays finite.
pub const MAX_HORIZON_YEARS: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

const MAX_APY_BPS: u32 = 100_000;

/// Yield curve shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CurveType {
    Flat,
    Logarithmic,
    Linear,
    Sigmoidal,
    Quadratic,
    CappedExponential,
}

impl CurveType {
    /// Stable numeric id
    pub const fn id(&self) -> u8 {
        match self {
            CurveType::Flat => 1,
            CurveType::Logarithmic => 2,
            CurveType::Linear => 3,
            CurveType::Sigmoidal => 4,
            CurveType::Quadratic => 5,
            CurveType::CappedExponential => 6,
        }
    }
}

impl TryFrom<u8> for CurveType {
    type Error = CurveError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(CurveType::Flat),
            2 => Ok(CurveType::Logarithmic),
            3 => Ok(CurveType::Linear),
            4 => Ok(CurveType::Sigmoidal),
            5 => Ok(CurveType::Quadratic),
            6 => Ok(CurveType::CappedExponential),
            other => Err(CurveError::UnknownCurve(other)),
        }
    }
}

/// Parameters of one tranche's curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveParams {
    pub curve: CurveType,
    pub apy_min_bps: u32,
    pub apy_max_bps: u32,
    /// NAV ceiling; required for `CappedExponential`, optional elsewhere
    #[serde(default)]
    pub cap: Option<Decimal>,
}

impl CurveParams {
    pub fn new(curve: CurveType, apy_min_bps: u32, apy_max_bps: u32) -> Self {
        Self {
            curve,
            apy_min_bps,
            apy_max_bps,
            cap: None,
        }
    }

    pub fn with_cap(mut self, cap: Decimal) -> Self {
        self.cap = Some(cap);
        self
    }

    /// Reject parameter sets that would break the curve contract
    pub fn validate(&self) -> Result<(), CurveError> {
        if self.apy_min_bps > self.apy_max_bps {
            return Err(CurveError::InvertedBounds {
                min_bps: self.apy_min_bps,
                max_bps: self.apy_max_bps,
            });
        }
        if self.apy_max_bps > MAX_APY_BPS {
            return Err(CurveError::ApyTooHigh(self.apy_max_bps));
        }
        match self.cap {
            None if self.curve == CurveType::CappedExponential => {
                Err(CurveError::MissingCap("capped_exponential"))
            }
            Some(cap) if cap < Decimal::ONE => Err(CurveError::CapBelowPar(cap)),
            _ => Ok(()),
        }
    }

    /// Effective annual yield at `years`, as a fraction (0.04 == 4%)
    pub fn effective_apy(&self, years: Decimal) -> Decimal {
        let t = clamp_years(years);
        let min = bps(self.apy_min_bps);
        let max = bps(self.apy_max_bps);
        let spread = max - min;

        match self.curve {
            CurveType::Flat | CurveType::CappedExponential => min,
            CurveType::Linear => max,
            CurveType::Logarithmic => {
                let l = (Decimal::ONE + t).checked_ln().unwrap_or(Decimal::ZERO);
                min + spread * l / (Decimal::ONE + l)
            }
            CurveType::Sigmoidal => {
                // tanh(t/2) = (1 - e^-t) / (1 + e^-t)
                let decay = (-t).checked_exp().unwrap_or(Decimal::ZERO);
                let s = (Decimal::ONE - decay) / (Decimal::ONE + decay);
                min + spread * s.max(Decimal::ZERO).min(Decimal::ONE)
            }
            CurveType::Quadratic => {
                let ramp = t.min(Decimal::ONE);
                min + spread * ramp * ramp
            }
        }
    }

    /// Effective APY at `years` in basis points
    pub fn effective_apy_bps(&self, years: Decimal) -> Decimal {
        self.effective_apy(years) * Decimal::from(10_000)
    }

    /// NAV multiplier after `years`, as an exact decimal
    pub fn nav_multiplier(&self, years: Decimal) -> Decimal {
        let t = clamp_years(years);

        let raw = match self.curve {
            CurveType::CappedExponential => {
                let growth = Decimal::ONE + bps(self.apy_min_bps);
                let cap = self.cap.unwrap_or(Decimal::ONE);
                let log_growth = growth.checked_ln().unwrap_or(Decimal::ZERO);
                let log_cap = cap.checked_ln().unwrap_or(Decimal::ZERO);
                let exponent = t * log_growth;
                if exponent >= log_cap {
                    cap
                } else {
                    exponent.checked_exp().unwrap_or(cap)
                }
            }
            _ => Decimal::ONE + self.effective_apy(t) * t,
        };

        match self.cap {
            Some(cap) => raw.min(cap).max(Decimal::ONE),
            None => raw.max(Decimal::ONE),
        }
    }

    /// NAV after `years` as a 9-decimal fixed-point value
    pub fn nav(&self, years: Decimal) -> Nav {
        Nav::from_decimal(self.nav_multiplier(years))
    }

    /// NAV of capital injected at `origin`, observed at `now`.
    ///
    /// A tranche that never received capital sits at par.
    pub fn nav_at(&self, origin: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Nav {
        match origin {
            Some(origin) => self.nav(years_between(origin, now)),
            None => Nav::ONE,
        }
    }
}

/// Elapsed years between two instants; negative spans count as zero.
pub fn years_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Decimal {
    let seconds = (to - from).num_seconds().max(0);
    Decimal::from(seconds) / Decimal::from(SECONDS_PER_YEAR)
}

fn clamp_years(years: Decimal) -> Decimal {
    years.max(Decimal::ZERO).min(MAX_HORIZON_YEARS)
}

fn bps(value: u32) -> Decimal {
    Decimal::new(value as i64, 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn btc() -> CurveParams {
        CurveParams::new(CurveType::Flat, 400, 400)
    }

    fn snr() -> CurveParams {
        CurveParams::new(CurveType::Logarithmic, 650, 800)
    }

    fn mezz() -> CurveParams {
        CurveParams::new(CurveType::Linear, 1000, 1000)
    }

    fn jnr() -> CurveParams {
        CurveParams::new(CurveType::Sigmoidal, 1250, 1600)
    }

    fn jnr_plus() -> CurveParams {
        CurveParams::new(CurveType::Quadratic, 1600, 2200)
    }

    fn eqt() -> CurveParams {
        CurveParams::new(CurveType::CappedExponential, 1500, 2500).with_cap(dec!(1.25))
    }

    fn all_curves() -> Vec<CurveParams> {
        vec![btc(), snr(), mezz(), jnr(), jnr_plus(), eqt()]
    }

    #[test]
    fn test_every_curve_starts_at_par() {
        for params in all_curves() {
            assert_eq!(params.nav(Decimal::ZERO), Nav::ONE, "{:?}", params.curve);
        }
    }

    #[test]
    fn test_flat_one_year() {
        assert_eq!(btc().nav(Decimal::ONE).raw(), 1_040_000_000);
    }

    #[test]
    fn test_linear_grows_without_bound() {
        assert_eq!(mezz().nav(dec!(2)).raw(), 1_200_000_000);
        assert_eq!(mezz().nav(dec!(10)).raw(), 2_000_000_000);
    }

    #[test]
    fn test_logarithmic_apy_stays_below_max() {
        let params = snr();
        let apy = params.effective_apy(dec!(500));
        assert!(apy < dec!(0.08));
        assert!(apy > dec!(0.065));
        let at_start = params.effective_apy(Decimal::ZERO);
        assert!((at_start - dec!(0.065)).abs() < dec!(0.000000001));
    }

    #[test]
    fn test_sigmoidal_saturates_at_max() {
        let params = jnr();
        assert_eq!(params.effective_apy(Decimal::ZERO), dec!(0.125));
        let saturated = params.effective_apy(dec!(900));
        assert!((saturated - dec!(0.16)).abs() < dec!(0.000000001));
    }

    #[test]
    fn test_quadratic_reaches_max_after_one_year() {
        let params = jnr_plus();
        assert_eq!(params.effective_apy(dec!(0.5)), dec!(0.175));
        assert_eq!(params.effective_apy(dec!(3)), dec!(0.22));
    }

    #[test]
    fn test_capped_exponential_hits_cap() {
        let params = eqt();
        let one_year = params.nav(Decimal::ONE).raw();
        assert!((1_149_999_990..=1_150_000_010).contains(&one_year));
        assert_eq!(params.nav(dec!(2)).raw(), 1_250_000_000);
        assert_eq!(params.nav(dec!(1000)).raw(), 1_250_000_000);
    }

    #[test]
    fn test_negative_years_clamp_to_par() {
        for params in all_curves() {
            assert_eq!(params.nav(dec!(-3)), Nav::ONE);
        }
    }

    #[test]
    fn test_nav_at_without_origin_is_par() {
        assert_eq!(mezz().nav_at(None, Utc::now()), Nav::ONE);
    }

    #[test]
    fn test_nav_at_one_year() {
        let origin = Utc::now();
        let now = origin + Duration::seconds(SECONDS_PER_YEAR);
        assert_eq!(btc().nav_at(Some(origin), now).raw(), 1_040_000_000);
    }

    #[test]
    fn test_validate() {
        assert!(eqt().validate().is_ok());
        assert_eq!(
            CurveParams::new(CurveType::CappedExponential, 100, 200).validate(),
            Err(CurveError::MissingCap("capped_exponential"))
        );
        assert!(matches!(
            CurveParams::new(CurveType::Flat, 500, 400).validate(),
            Err(CurveError::InvertedBounds { .. })
        ));
        assert!(matches!(
            btc().with_cap(dec!(0.9)).validate(),
            Err(CurveError::CapBelowPar(_))
        ));
    }

    #[test]
    fn test_curve_ids() {
        for id in 1..=6u8 {
            assert_eq!(CurveType::try_from(id).unwrap().id(), id);
        }
        assert_eq!(CurveType::try_from(9), Err(CurveError::UnknownCurve(9)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_nav_monotone(curve_idx in 0usize..6, a in 0u64..200_000_000, b in 0u64..200_000_000) {
            let params = all_curves()[curve_idx];
            let (early, late) = (a.min(b), a.max(b));
            let t1 = Decimal::new(early as i64, 6);
            let t2 = Decimal::new(late as i64, 6);
            prop_assert!(params.nav(t2) >= params.nav(t1));
        }

        #[test]
        fn prop_capped_never_exceeds_cap(t in 0u64..1_000_000_000) {
            let nav = eqt().nav(Decimal::new(t as i64, 6));
            prop_assert!(nav.raw() <= 1_250_000_000);
        }
    }
}
