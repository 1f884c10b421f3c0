//! Tranche registry - the six tranche configurations and their capital
//!
//! Tranches are created once from `VaultConfig` with zero capital and are
//! never destroyed. Only deposits, withdrawals, premiums and losses move
//! their capital.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tranchevault_core::{Amount, TrancheId};
use tranchevault_curves::{CurveParams, Nav};

use crate::config::{TrancheParams, VaultConfig};
use crate::error::VaultError;

/// Live configuration and balance of one tranche
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheConfig {
    pub id: TrancheId,
    /// Capital currently held, reserved withdrawals included
    pub capital: Amount,
    /// Depositor units outstanding; each is a pro-rata claim on the
    /// unreserved capital
    pub units: Amount,
    pub curve: CurveParams,
    pub target_allocation_pct: u8,
    /// Curve time origin: the last injection into an empty tranche
    pub deposit_timestamp: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
    pub locked_amount: Amount,
}

impl TrancheConfig {
    pub fn new(params: &TrancheParams) -> Self {
        Self {
            id: params.tranche,
            capital: Amount::ZERO,
            units: Amount::ZERO,
            curve: params.curve,
            target_allocation_pct: params.target_allocation_pct,
            deposit_timestamp: None,
            locked_until: None,
            locked_amount: Amount::ZERO,
        }
    }

    /// Current NAV multiplier of this tranche
    pub fn nav(&self, now: DateTime<Utc>) -> Nav {
        self.curve.nav_at(self.deposit_timestamp, now)
    }

    /// Lock window still running at `now`
    pub fn lock_active(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if now < until)
    }
}

/// Fixed table of the six tranches, indexed by `TrancheId`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheRegistry {
    tranches: [TrancheConfig; 6],
}

impl TrancheRegistry {
    /// Build the registry from deployment parameters.
    ///
    /// The config must already be validated.
    pub fn from_config(config: &VaultConfig) -> Result<Self, VaultError> {
        let mut built = Vec::with_capacity(TrancheId::ALL.len());
        for id in TrancheId::ALL {
            let params = config
                .tranche(id)
                .ok_or_else(|| VaultError::invalid(format!("missing tranche {}", id)))?;
            built.push(TrancheConfig::new(params));
        }
        let tranches: [TrancheConfig; 6] = built
            .try_into()
            .map_err(|_| VaultError::invalid("tranche table must have 6 entries"))?;
        Ok(Self { tranches })
    }

    pub fn get(&self, id: TrancheId) -> &TrancheConfig {
        &self.tranches[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: TrancheId) -> &mut TrancheConfig {
        &mut self.tranches[id.index()]
    }

    /// All tranches, most senior first
    pub fn iter(&self) -> impl Iterator<Item = &TrancheConfig> {
        self.tranches.iter()
    }

    /// Sum of tranche capital
    pub fn sum_capital(&self) -> Option<Amount> {
        self.tranches
            .iter()
            .try_fold(Amount::ZERO, |acc, t| acc.checked_add(&t.capital))
    }

    /// Add capital to a tranche, starting its curve if it was empty.
    pub(crate) fn inject(
        &mut self,
        id: TrancheId,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        let tranche = self.get_mut(id);
        let capital = tranche
            .capital
            .checked_add(&amount)
            .ok_or(VaultError::Overflow("tranche capital"))?;
        if tranche.capital.is_zero() && !amount.is_zero() {
            tranche.deposit_timestamp = Some(now);
        }
        tranche.capital = capital;
        Ok(())
    }

    /// Remove capital from a tranche
    pub(crate) fn drain(&mut self, id: TrancheId, amount: Amount) -> Result<(), VaultError> {
        let tranche = self.get_mut(id);
        tranche.capital = tranche
            .capital
            .checked_sub(&amount)
            .ok_or(VaultError::InsufficientBalance {
                available: tranche.capital,
                required: amount,
            })?;
        Ok(())
    }
}
