//! Vault state
//!
//! The single mutable resource of the vault. Handlers receive it by
//! `&mut` and nothing else holds it, so all mutation is serialized by
//! construction.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tranchevault_core::{AccountId, Amount, TrancheId};
use tranchevault_curves::Nav;

use crate::breaker::CircuitBreaker;
use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::pending::{PendingTx, TrancheLock};
use crate::query::ApyBounds;
use crate::tranche::{TrancheConfig, TrancheRegistry};

/// Per-tranche holding of one depositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositorBalance {
    pub units: Amount,
    /// Unit-weighted average injection time, origin of individual accrual
    pub deposited_at: DateTime<Utc>,
}

impl DepositorBalance {
    /// Merge `amount` injected at `at`, moving the accrual origin by weight
    pub(crate) fn merged(&self, amount: Amount, at: DateTime<Utc>) -> Option<DepositorBalance> {
        let units = self.units.checked_add(&amount)?;
        if units.is_zero() {
            return Some(*self);
        }
        let weight = amount.to_decimal() / units.to_decimal();
        let shift = Decimal::from((at - self.deposited_at).num_seconds()) * weight;
        let deposited_at = self.deposited_at + Duration::seconds(shift.trunc().to_i64()?);
        Some(DepositorBalance {
            units,
            deposited_at,
        })
    }
}

/// Addresses of the protocol collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    pub admin: AccountId,
    pub master_factory: AccountId,
    pub float_manager: AccountId,
    pub claims_processor: AccountId,
}

/// The vault singleton
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    pub(crate) tranches: TrancheRegistry,
    pub(crate) depositors: BTreeMap<AccountId, BTreeMap<TrancheId, DepositorBalance>>,

    pub(crate) total_capital: Amount,
    pub(crate) total_coverage_sold: Amount,
    pub(crate) accumulated_premiums: Amount,
    pub(crate) accumulated_losses: Amount,
    pub(crate) protocol_earned_capital: Amount,
    /// Claim amounts that exceeded all available capital
    pub(crate) unpaid_shortfall: Amount,

    pub(crate) paused: bool,
    pub(crate) reentrancy_guard: bool,
    pub(crate) seq_no: u64,
    pub(crate) breaker: CircuitBreaker,
    pub(crate) pending_txs: BTreeMap<u64, PendingTx>,
    pub(crate) tranche_locks: BTreeMap<TrancheId, TrancheLock>,

    pub(crate) roles: Roles,
    pub(crate) processed_claims: BTreeSet<String>,
}

impl VaultState {
    /// Create the vault at deployment: six empty tranches, unpaused.
    pub fn new(config: &VaultConfig) -> Result<Self, VaultError> {
        config
            .validate()
            .map_err(|e| VaultError::invalid(e.to_string()))?;

        Ok(Self {
            tranches: TrancheRegistry::from_config(config)?,
            depositors: BTreeMap::new(),
            total_capital: Amount::ZERO,
            total_coverage_sold: Amount::ZERO,
            accumulated_premiums: Amount::ZERO,
            accumulated_losses: Amount::ZERO,
            protocol_earned_capital: Amount::ZERO,
            unpaid_shortfall: Amount::ZERO,
            paused: false,
            reentrancy_guard: false,
            seq_no: 0,
            breaker: CircuitBreaker::new(config.breaker_window_secs, config.breaker_loss_cap),
            pending_txs: BTreeMap::new(),
            tranche_locks: BTreeMap::new(),
            roles: Roles {
                admin: config.admin.clone(),
                master_factory: config.master_factory.clone(),
                float_manager: config.float_manager.clone(),
                claims_processor: config.claims_processor.clone(),
            },
            processed_claims: BTreeSet::new(),
        })
    }

    // === Read-only queries ===

    pub fn tranche(&self, id: TrancheId) -> &TrancheConfig {
        self.tranches.get(id)
    }

    pub fn tranches(&self) -> &TrancheRegistry {
        &self.tranches
    }

    pub fn tranche_capital(&self, id: TrancheId) -> Amount {
        self.tranches.get(id).capital
    }

    pub fn tranche_apy(&self, id: TrancheId) -> ApyBounds {
        let curve = &self.tranches.get(id).curve;
        ApyBounds {
            min_bps: curve.apy_min_bps,
            max_bps: curve.apy_max_bps,
        }
    }

    pub fn tranche_nav(&self, id: TrancheId, now: DateTime<Utc>) -> Nav {
        self.tranches.get(id).nav(now)
    }

    pub fn total_capital(&self) -> Amount {
        self.total_capital
    }

    pub fn accumulated_premiums(&self) -> Amount {
        self.accumulated_premiums
    }

    pub fn accumulated_losses(&self) -> Amount {
        self.accumulated_losses
    }

    pub fn protocol_earned_capital(&self) -> Amount {
        self.protocol_earned_capital
    }

    pub fn total_coverage_sold(&self) -> Amount {
        self.total_coverage_sold
    }

    pub fn unpaid_shortfall(&self) -> Amount {
        self.unpaid_shortfall
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn reentrancy_guard(&self) -> bool {
        self.reentrancy_guard
    }

    pub fn seq_no(&self) -> u64 {
        self.seq_no
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    pub fn pending(&self, seq_no: u64) -> Option<&PendingTx> {
        self.pending_txs.get(&seq_no)
    }

    pub fn pending_txs(&self) -> impl Iterator<Item = &PendingTx> {
        self.pending_txs.values()
    }

    pub fn tranche_lock(&self, id: TrancheId) -> Option<&TrancheLock> {
        self.tranche_locks.get(&id)
    }

    pub fn is_claim_processed(&self, claim_ref: &str) -> bool {
        self.processed_claims.contains(claim_ref)
    }

    /// Capital reserved by in-flight withdrawals
    pub fn reserved(&self, id: TrancheId) -> Amount {
        self.tranche_locks
            .get(&id)
            .map(|lock| lock.reserved)
            .unwrap_or(Amount::ZERO)
    }

    /// Capital not reserved by in-flight withdrawals
    pub fn available_capital(&self, id: TrancheId) -> Amount {
        self.tranche_capital(id).saturating_sub(&self.reserved(id))
    }

    pub fn depositor_balance(&self, depositor: &AccountId, id: TrancheId) -> Option<&DepositorBalance> {
        self.depositors.get(depositor).and_then(|m| m.get(&id))
    }

    /// Units a depositor holds in a tranche (zero if none)
    pub fn depositor_units(&self, depositor: &AccountId, id: TrancheId) -> Amount {
        self.depositor_balance(depositor, id)
            .map(|b| b.units)
            .unwrap_or(Amount::ZERO)
    }

    pub fn depositor_count(&self) -> usize {
        self.depositors.len()
    }

    /// Units outstanding in a tranche
    pub fn tranche_units(&self, id: TrancheId) -> Amount {
        self.tranches.get(id).units
    }

    /// Redeemable value of `units` of a tranche, rounded down.
    ///
    /// Units share the unreserved capital pro rata, so losses and
    /// premiums move every holder's value together.
    pub fn units_value(&self, id: TrancheId, units: Amount) -> Option<Amount> {
        let outstanding = self.tranche_units(id);
        if outstanding.is_zero() {
            return Some(Amount::ZERO);
        }
        units.pro_rata(self.available_capital(id), outstanding)
    }

    /// Units to mint for `amount` paid into a tranche at the current price.
    ///
    /// An empty pool mints one unit per nano-unit paid in.
    pub fn units_for(&self, id: TrancheId, amount: Amount) -> Option<Amount> {
        let outstanding = self.tranche_units(id);
        let available = self.available_capital(id);
        if outstanding.is_zero() || available.is_zero() {
            return Some(amount);
        }
        amount.pro_rata(outstanding, available)
    }

    // === Depositor bookkeeping ===

    /// Mint `units` to a depositor
    pub(crate) fn credit_depositor(
        &mut self,
        depositor: &AccountId,
        id: TrancheId,
        units: Amount,
        at: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        if units.is_zero() {
            return Ok(());
        }
        let merged = match self.depositor_balance(depositor, id) {
            Some(existing) => existing
                .merged(units, at)
                .ok_or(VaultError::Overflow("depositor balance"))?,
            None => DepositorBalance {
                units,
                deposited_at: at,
            },
        };
        let outstanding = self
            .tranche_units(id)
            .checked_add(&units)
            .ok_or(VaultError::Overflow("tranche units"))?;

        self.tranches.get_mut(id).units = outstanding;
        self.depositors
            .entry(depositor.clone())
            .or_default()
            .insert(id, merged);
        Ok(())
    }

    /// Burn `units` from a depositor
    pub(crate) fn debit_depositor(
        &mut self,
        depositor: &AccountId,
        id: TrancheId,
        units: Amount,
    ) -> Result<(), VaultError> {
        let held = self.depositor_units(depositor, id);
        let remaining = held
            .checked_sub(&units)
            .ok_or(VaultError::InsufficientBalance {
                available: held,
                required: units,
            })?;
        let outstanding = self
            .tranche_units(id)
            .checked_sub(&units)
            .ok_or(VaultError::Overflow("tranche units"))?;

        self.tranches.get_mut(id).units = outstanding;
        if let Some(per_tranche) = self.depositors.get_mut(depositor) {
            if remaining.is_zero() {
                per_tranche.remove(&id);
            } else if let Some(balance) = per_tranche.get_mut(&id) {
                balance.units = remaining;
            }
            if per_tranche.is_empty() {
                self.depositors.remove(depositor);
            }
        }
        Ok(())
    }

    /// Cancel every unit of a tranche whose unreserved capital is gone.
    ///
    /// Returns the units written off.
    pub(crate) fn write_off_units(&mut self, id: TrancheId) -> Amount {
        let written_off = self.tranche_units(id);
        self.tranches.get_mut(id).units = Amount::ZERO;
        self.depositors.retain(|_, per_tranche| {
            per_tranche.remove(&id);
            !per_tranche.is_empty()
        });
        written_off
    }

    /// Check the structural invariants; returns the first violation.
    pub fn verify_invariants(&self) -> Result<(), String> {
        let sum = self
            .tranches
            .sum_capital()
            .ok_or_else(|| "tranche capital sum overflows".to_string())?;
        if sum != self.total_capital {
            return Err(format!(
                "total_capital {} != sum of tranches {}",
                self.total_capital, sum
            ));
        }

        for tranche in self.tranches.iter() {
            let reserved = self.reserved(tranche.id);
            if reserved > tranche.capital {
                return Err(format!(
                    "tranche {} reserves {} but holds {}",
                    tranche.id, reserved, tranche.capital
                ));
            }

            let held = self
                .depositors
                .values()
                .filter_map(|per_tranche| per_tranche.get(&tranche.id))
                .try_fold(Amount::ZERO, |acc, b| acc.checked_add(&b.units))
                .ok_or_else(|| format!("tranche {} unit sum overflows", tranche.id))?;
            if held != tranche.units {
                return Err(format!(
                    "tranche {} has {} units outstanding but depositors hold {}",
                    tranche.id, tranche.units, held
                ));
            }
            if !tranche.units.is_zero() && self.available_capital(tranche.id).is_zero() {
                return Err(format!("tranche {} units are unbacked", tranche.id));
            }
        }

        if self.breaker.window_losses() > self.breaker.loss_cap() {
            return Err("circuit breaker window exceeds cap".to_string());
        }

        if self.reentrancy_guard {
            return Err("reentrancy guard still held".to_string());
        }

        Ok(())
    }
}
