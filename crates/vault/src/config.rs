//! Vault configuration with configurable parameters
//!
//! Every field has a serde default, so a partial JSON file only overrides
//! what it names. Tranche curve parameters are fixed at deployment.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tranchevault_core::{AccountId, Amount, TrancheId, MIN_DEPOSIT};
use tranchevault_curves::{CurveError, CurveParams, CurveType};

/// Upper bound for configured durations (100 years)
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 86_400;

/// Errors loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid curve for {tranche}: {source}")]
    Curve {
        tranche: TrancheId,
        #[source]
        source: CurveError,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Deployment parameters of one tranche
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheParams {
    pub tranche: TrancheId,
    pub curve: CurveParams,
    /// Share of premium inflow routed here (percent)
    pub target_allocation_pct: u8,
}

/// Configuration for the vault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    // === Roles at deployment ===
    #[serde(default = "default_admin")]
    pub admin: AccountId,

    #[serde(default = "default_master_factory")]
    pub master_factory: AccountId,

    #[serde(default = "default_float_manager")]
    pub float_manager: AccountId,

    #[serde(default = "default_claims_processor")]
    pub claims_processor: AccountId,

    // === Limits ===
    /// Smallest accepted deposit
    #[serde(default = "default_min_deposit")]
    pub min_deposit: Amount,

    /// Rolling window of the circuit breaker (seconds)
    #[serde(default = "default_breaker_window_secs")]
    pub breaker_window_secs: u64,

    /// Maximum losses absorbed inside one window
    #[serde(default = "default_breaker_loss_cap")]
    pub breaker_loss_cap: Amount,

    /// Age after which a pending operation may be swept (seconds)
    #[serde(default = "default_pending_timeout_secs")]
    pub pending_timeout_secs: u64,

    // === Economics ===
    /// Cut of each premium kept as protocol earnings (basis points)
    #[serde(default)]
    pub protocol_fee_bps: u16,

    /// Pause the vault when a claim exceeds all available capital
    #[serde(default = "default_pause_on_insolvency")]
    pub pause_on_insolvency: bool,

    #[serde(default = "default_tranches")]
    pub tranches: Vec<TrancheParams>,
}

// Default value functions for serde
fn default_admin() -> AccountId {
    AccountId::from("admin")
}

fn default_master_factory() -> AccountId {
    AccountId::from("master_factory")
}

fn default_float_manager() -> AccountId {
    AccountId::from("float_manager")
}

fn default_claims_processor() -> AccountId {
    AccountId::from("claims_processor")
}

fn default_min_deposit() -> Amount {
    MIN_DEPOSIT
}

fn default_breaker_window_secs() -> u64 {
    86_400 // 24 hours
}

fn default_breaker_loss_cap() -> Amount {
    Amount::from_units(1_000_000)
}

fn default_pending_timeout_secs() -> u64 {
    3_600
}

fn default_pause_on_insolvency() -> bool {
    true
}

fn default_tranches() -> Vec<TrancheParams> {
    let tranche = |tranche, curve, min, max, pct| TrancheParams {
        tranche,
        curve: CurveParams::new(curve, min, max),
        target_allocation_pct: pct,
    };

    let mut eqt = tranche(TrancheId::Eqt, CurveType::CappedExponential, 1500, 2500, 10);
    eqt.curve = eqt.curve.with_cap(Decimal::new(125, 2));

    vec![
        tranche(TrancheId::Btc, CurveType::Flat, 400, 400, 25),
        tranche(TrancheId::Snr, CurveType::Logarithmic, 650, 800, 20),
        tranche(TrancheId::Mezz, CurveType::Linear, 1000, 1000, 18),
        tranche(TrancheId::Jnr, CurveType::Sigmoidal, 1250, 1600, 15),
        tranche(TrancheId::JnrPlus, CurveType::Quadratic, 1600, 2200, 12),
        eqt,
    ]
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            admin: default_admin(),
            master_factory: default_master_factory(),
            float_manager: default_float_manager(),
            claims_processor: default_claims_processor(),
            min_deposit: default_min_deposit(),
            breaker_window_secs: default_breaker_window_secs(),
            breaker_loss_cap: default_breaker_loss_cap(),
            pending_timeout_secs: default_pending_timeout_secs(),
            protocol_fee_bps: 0,
            pause_on_insolvency: default_pause_on_insolvency(),
            tranches: default_tranches(),
        }
    }
}

impl VaultConfig {
    /// Load configuration from a JSON file and validate it
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: VaultConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parameters of one tranche
    pub fn tranche(&self, id: TrancheId) -> Option<&TrancheParams> {
        self.tranches.iter().find(|t| t.tranche == id)
    }

    /// Pending timeout as a chrono Duration
    pub fn pending_timeout(&self) -> chrono::Duration {
        i64::try_from(self.pending_timeout_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tranches.len() != TrancheId::ALL.len() {
            return Err(ConfigError::Invalid(format!(
                "expected 6 tranches, got {}",
                self.tranches.len()
            )));
        }

        for id in TrancheId::ALL {
            let params = self
                .tranche(id)
                .ok_or_else(|| ConfigError::Invalid(format!("missing tranche {}", id)))?;
            params
                .curve
                .validate()
                .map_err(|source| ConfigError::Curve { tranche: id, source })?;
        }

        let allocation: u32 = self
            .tranches
            .iter()
            .map(|t| t.target_allocation_pct as u32)
            .sum();
        if allocation != 100 {
            return Err(ConfigError::Invalid(format!(
                "target allocations sum to {}%, expected 100%",
                allocation
            )));
        }

        if self.protocol_fee_bps > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "protocol_fee_bps {} exceeds 10000",
                self.protocol_fee_bps
            )));
        }

        if self.breaker_window_secs == 0 {
            return Err(ConfigError::Invalid("breaker_window_secs must be > 0".into()));
        }

        for (name, secs) in [
            ("breaker_window_secs", self.breaker_window_secs),
            ("pending_timeout_secs", self.pending_timeout_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{} {} exceeds {}",
                    name, secs, MAX_DURATION_SECS
                )));
            }
        }

        if self.min_deposit.is_zero() {
            return Err(ConfigError::Invalid("min_deposit must be > 0".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();

        assert_eq!(config.min_deposit, MIN_DEPOSIT);
        assert_eq!(config.breaker_window_secs, 86_400);
        assert_eq!(config.breaker_loss_cap, Amount::from_units(1_000_000));
        assert_eq!(config.pending_timeout_secs, 3_600);
        assert_eq!(config.protocol_fee_bps, 0);
        assert!(config.pause_on_insolvency);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_tranche_table() {
        let config = VaultConfig::default();
        let eqt = config.tranche(TrancheId::Eqt).unwrap();
        assert_eq!(eqt.curve.curve, CurveType::CappedExponential);
        assert_eq!(eqt.curve.cap, Some(Decimal::new(125, 2)));

        let btc = config.tranche(TrancheId::Btc).unwrap();
        assert_eq!(btc.curve.apy_min_bps, 400);
        assert_eq!(btc.target_allocation_pct, 25);
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "breaker_loss_cap": "500", "protocol_fee_bps": 250 }"#;
        let config: VaultConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.breaker_loss_cap, Amount::from_units(500));
        assert_eq!(config.protocol_fee_bps, 250);
        assert_eq!(config.breaker_window_secs, 86_400); // default
        assert_eq!(config.tranches.len(), 6); // default
    }

    #[test]
    fn test_allocation_must_sum_to_100() {
        let mut config = VaultConfig::default();
        config.tranches[0].target_allocation_pct = 30;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_durations_are_bounded() {
        let config = VaultConfig {
            breaker_window_secs: u64::MAX,
            ..VaultConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = VaultConfig {
            pending_timeout_secs: MAX_DURATION_SECS + 1,
            ..VaultConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = VaultConfig {
            breaker_window_secs: MAX_DURATION_SECS,
            pending_timeout_secs: MAX_DURATION_SECS,
            ..VaultConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.pending_timeout().num_seconds(), MAX_DURATION_SECS as i64);
    }

    #[test]
    fn test_missing_eqt_cap_rejected() {
        let mut config = VaultConfig::default();
        config.tranches[5].curve.cap = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Curve { tranche: TrancheId::Eqt, .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "admin": "ops", "pending_timeout_secs": 60 }}"#).unwrap();

        let config = VaultConfig::from_file(file.path()).unwrap();
        assert_eq!(config.admin, AccountId::from("ops"));
        assert_eq!(config.pending_timeout(), chrono::Duration::seconds(60));
    }
}
