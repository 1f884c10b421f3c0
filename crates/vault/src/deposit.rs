//! Deposits and two-phase withdrawals
//!
//! Depositors hold units of a tranche. Units share the tranche's
//! unreserved capital pro rata, so premiums raise and losses lower every
//! holder's value alike. Amounts in deposits and withdrawals are capital;
//! the unit count follows from the price at the time.
//!
//! A withdrawal burns units and reserves tranche capital under a fresh
//! `seq_no`, then asks the float manager to pay. Capital only leaves the
//! tranche when the float manager confirms; a failed payout, an admin
//! cancel or a timeout sweep rolls everything back.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use tranchevault_core::{AccountId, Amount, TrancheId};

use crate::config::VaultConfig;
use crate::dispatch::Outcome;
use crate::error::VaultError;
use crate::message::{Outbound, Reply};
use crate::pending::{PendingKind, PendingTx};
use crate::state::VaultState;

/// Add `amount` to a tranche on behalf of `depositor`
pub(crate) fn deposit(
    state: &mut VaultState,
    config: &VaultConfig,
    depositor: &AccountId,
    tranche: TrancheId,
    amount: Amount,
    now: DateTime<Utc>,
) -> Result<Outcome, VaultError> {
    if amount < config.min_deposit {
        return Err(VaultError::invalid(format!(
            "deposit {} below minimum {}",
            amount, config.min_deposit
        )));
    }

    let tranche_capital = state
        .tranche_capital(tranche)
        .checked_add(&amount)
        .ok_or(VaultError::Overflow("tranche capital"))?;
    let total_capital = state
        .total_capital
        .checked_add(&amount)
        .ok_or(VaultError::Overflow("total capital"))?;
    let units = state
        .units_for(tranche, amount)
        .ok_or(VaultError::Overflow("tranche units"))?;
    if units.is_zero() {
        return Err(VaultError::invalid(format!(
            "deposit {} buys no units of {}",
            amount, tranche
        )));
    }
    state
        .tranche_units(tranche)
        .checked_add(&units)
        .ok_or(VaultError::Overflow("tranche units"))?;

    // Commit
    state.credit_depositor(depositor, tranche, units, now)?;
    state.tranches.inject(tranche, amount, now)?;
    state.total_capital = total_capital;

    info!(depositor = %depositor, %tranche, %amount, %units, "deposit accepted");

    Ok(Outcome::reply(Reply::Deposited {
        tranche,
        amount,
        units,
        tranche_capital,
    }))
}

/// Phase one of a withdrawal: debit, reserve and request payout
pub(crate) fn withdraw(
    state: &mut VaultState,
    depositor: &AccountId,
    tranche: TrancheId,
    amount: Amount,
    now: DateTime<Utc>,
) -> Result<Outcome, VaultError> {
    if amount.is_zero() {
        return Err(VaultError::invalid("withdrawal amount must be positive"));
    }

    let available = state.available_capital(tranche);
    let config = state.tranche(tranche);
    if config.lock_active(now) {
        let unlocked = available.saturating_sub(&config.locked_amount);
        if amount > unlocked {
            if let Some(locked_until) = config.locked_until {
                return Err(VaultError::LockViolation {
                    tranche,
                    locked_until,
                    unlocked,
                });
            }
        }
    }

    let balance = state
        .depositor_balance(depositor, tranche)
        .copied()
        .ok_or(VaultError::InsufficientBalance {
            available: Amount::ZERO,
            required: amount,
        })?;
    let held_value = state
        .units_value(tranche, balance.units)
        .ok_or(VaultError::Overflow("position value"))?;
    if amount > held_value {
        return Err(VaultError::InsufficientBalance {
            available: held_value,
            required: amount,
        });
    }
    // Rounded up so the remaining holders never pay for the rounding
    let burned = amount
        .pro_rata_ceil(state.tranche_units(tranche), available)
        .ok_or(VaultError::Overflow("tranche units"))?;

    let seq_no = state
        .seq_no
        .checked_add(1)
        .ok_or(VaultError::Overflow("sequence number"))?;

    // Commit
    state.debit_depositor(depositor, tranche, burned)?;
    state
        .tranche_locks
        .entry(tranche)
        .or_default()
        .reserve(seq_no, amount)
        .ok_or(VaultError::Overflow("tranche reservation"))?;
    state.pending_txs.insert(
        seq_no,
        PendingTx {
            seq_no,
            kind: PendingKind::Withdrawal,
            depositor: depositor.clone(),
            tranche,
            amount,
            deposited_at: balance.deposited_at,
            created_at: now,
        },
    );
    state.seq_no = seq_no;

    info!(seq_no, depositor = %depositor, %tranche, %amount, %burned, "withdrawal pending");

    Ok(Outcome {
        reply: Reply::WithdrawalPending {
            seq_no,
            tranche,
            amount,
        },
        outbound: vec![Outbound::PayoutRequest {
            to: state.roles.float_manager.clone(),
            seq_no,
            depositor: depositor.clone(),
            tranche,
            amount,
        }],
    })
}

/// Phase two: settle or roll back a pending withdrawal
pub(crate) fn confirm_payout(
    state: &mut VaultState,
    seq_no: u64,
    success: bool,
) -> Result<Outcome, VaultError> {
    let pending = state
        .pending(seq_no)
        .cloned()
        .ok_or(VaultError::PendingNotFound(seq_no))?;

    if !success {
        rollback(state, &pending)?;
        warn!(seq_no, "payout failed, withdrawal rolled back");
        return Ok(Outcome::reply(Reply::PayoutSettled {
            seq_no,
            paid: false,
        }));
    }

    let total_capital = state
        .total_capital
        .checked_sub(&pending.amount)
        .ok_or(VaultError::Overflow("total capital"))?;

    // Commit
    state.tranches.drain(pending.tranche, pending.amount)?;
    state.total_capital = total_capital;
    release(state, &pending);

    info!(seq_no, tranche = %pending.tranche, amount = %pending.amount, "withdrawal settled");

    Ok(Outcome::reply(Reply::PayoutSettled { seq_no, paid: true }))
}

/// Admin cancel of a pending withdrawal
pub(crate) fn cancel_pending(state: &mut VaultState, seq_no: u64) -> Result<Outcome, VaultError> {
    let pending = state
        .pending(seq_no)
        .cloned()
        .ok_or(VaultError::PendingNotFound(seq_no))?;
    rollback(state, &pending)?;

    warn!(seq_no, "pending withdrawal cancelled");

    Ok(Outcome {
        reply: Reply::PendingCancelled { seq_no },
        outbound: vec![Outbound::PendingRolledBack {
            to: state.roles.float_manager.clone(),
            seq_no,
            reason: "cancelled".to_string(),
        }],
    })
}

/// Roll back every pending withdrawal older than the configured timeout
pub(crate) fn sweep_expired(
    state: &mut VaultState,
    config: &VaultConfig,
    now: DateTime<Utc>,
) -> Result<Outcome, VaultError> {
    let timeout = config.pending_timeout();
    let expired: Vec<PendingTx> = state
        .pending_txs()
        .filter(|tx| tx.is_expired(now, timeout))
        .cloned()
        .collect();

    let mut outbound = Vec::with_capacity(expired.len());
    for tx in &expired {
        rollback(state, tx)?;
        outbound.push(Outbound::PendingRolledBack {
            to: state.roles.float_manager.clone(),
            seq_no: tx.seq_no,
            reason: "expired".to_string(),
        });
    }

    if !expired.is_empty() {
        warn!(count = expired.len(), "expired withdrawals rolled back");
    }

    Ok(Outcome {
        reply: Reply::Swept {
            rolled_back: expired.iter().map(|tx| tx.seq_no).collect(),
        },
        outbound,
    })
}

/// Set or clear the withdrawal lock of a tranche
pub(crate) fn set_tranche_lock(
    state: &mut VaultState,
    tranche: TrancheId,
    amount: Amount,
    until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Outcome, VaultError> {
    if let Some(until) = until {
        if until <= now {
            return Err(VaultError::invalid("lock end must be in the future"));
        }
    }

    let config = state.tranches.get_mut(tranche);
    match until {
        Some(until) => {
            config.locked_until = Some(until);
            config.locked_amount = amount;
            info!(%tranche, %amount, %until, "tranche lock set");
        }
        None => {
            config.locked_until = None;
            config.locked_amount = Amount::ZERO;
            info!(%tranche, "tranche lock cleared");
        }
    }

    Ok(Outcome::reply(Reply::LockSet { tranche }))
}

/// Undo phase one: free the reservation and buy the depositor back in at
/// the current price
fn rollback(state: &mut VaultState, pending: &PendingTx) -> Result<(), VaultError> {
    let units = state
        .units_for(pending.tranche, pending.amount)
        .ok_or(VaultError::Overflow("tranche units"))?;
    state.credit_depositor(&pending.depositor, pending.tranche, units, pending.deposited_at)?;
    release(state, pending);
    Ok(())
}

fn release(state: &mut VaultState, pending: &PendingTx) {
    if let Some(lock) = state.tranche_locks.get_mut(&pending.tranche) {
        lock.release(pending.seq_no, pending.amount);
        if lock.is_empty() {
            state.tranche_locks.remove(&pending.tranche);
        }
    }
    state.pending_txs.remove(&pending.seq_no);
}
