//! Loss waterfall - claims are absorbed junior first
//!
//! A claim is drawn from EQT, then JNR_PLUS, JNR, MEZZ, SNR and finally
//! BTC. Each tranche gives up at most its available capital (capital not
//! reserved by an in-flight withdrawal) before the next one is touched.
//!
//! The plan is computed without touching state. The circuit breaker then
//! checks the absorbed amount, and only after both succeed is anything
//! committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use tranchevault_core::{AccountId, Amount, TrancheId};

use crate::config::VaultConfig;
use crate::dispatch::Outcome;
use crate::error::VaultError;
use crate::message::{ClaimReceipt, ClaimStatus, Outbound, Reply};
use crate::state::VaultState;

/// Absorption by one tranche
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheDraw {
    pub tranche: TrancheId,
    pub capital_before: Amount,
    pub drawn: Amount,
    pub capital_after: Amount,
}

/// How a loss would be spread over the tranches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossPlan {
    pub requested: Amount,
    /// Non-empty draws, junior first
    pub draws: Vec<TrancheDraw>,
    pub absorbed: Amount,
    /// Part of the loss no tranche could cover
    pub shortfall: Amount,
}

impl LossPlan {
    pub fn is_solvent(&self) -> bool {
        self.shortfall.is_zero()
    }
}

/// Spread `loss` over the tranches in waterfall order
pub fn plan_loss(state: &VaultState, loss: Amount) -> LossPlan {
    let mut remaining = loss;
    let mut absorbed = Amount::ZERO;
    let mut draws = Vec::new();

    for id in TrancheId::WATERFALL {
        if remaining.is_zero() {
            break;
        }
        let drawn = remaining.min(state.available_capital(id));
        if drawn.is_zero() {
            continue;
        }
        let capital_before = state.tranche_capital(id);
        draws.push(TrancheDraw {
            tranche: id,
            capital_before,
            drawn,
            capital_after: capital_before.saturating_sub(&drawn),
        });
        remaining = remaining.saturating_sub(&drawn);
        // drawn <= remaining <= loss, so the running sum stays below loss
        absorbed = absorbed.checked_add(&drawn).unwrap_or(loss);
    }

    LossPlan {
        requested: loss,
        draws,
        absorbed,
        shortfall: remaining,
    }
}

/// Absorb a claim through the waterfall.
///
/// A claim larger than all available capital drains every tranche,
/// records the rest as unpaid shortfall and (if configured) pauses the
/// vault. A claim the circuit breaker rejects changes nothing.
pub(crate) fn apply_claim(
    state: &mut VaultState,
    config: &VaultConfig,
    sender: &AccountId,
    claim_ref: &str,
    amount: Amount,
    now: DateTime<Utc>,
) -> Result<Outcome, VaultError> {
    if amount.is_zero() {
        return Err(VaultError::invalid("claim amount must be positive"));
    }
    if claim_ref.trim().is_empty() {
        return Err(VaultError::invalid("claim reference is empty"));
    }
    if state.is_claim_processed(claim_ref) {
        return Err(VaultError::invalid(format!(
            "claim {} already processed",
            claim_ref
        )));
    }

    let plan = plan_loss(state, amount);
    debug!(
        claim_ref,
        requested = %plan.requested,
        absorbed = %plan.absorbed,
        shortfall = %plan.shortfall,
        "claim planned"
    );

    let projection = state.breaker.check(now, plan.absorbed)?;

    let total_capital = state
        .total_capital
        .checked_sub(&plan.absorbed)
        .ok_or(VaultError::Overflow("total capital"))?;
    let accumulated_losses = state
        .accumulated_losses
        .checked_add(&plan.absorbed)
        .ok_or(VaultError::Overflow("accumulated losses"))?;
    let unpaid_shortfall = state
        .unpaid_shortfall
        .checked_add(&plan.shortfall)
        .ok_or(VaultError::Overflow("unpaid shortfall"))?;

    // Commit
    for draw in &plan.draws {
        state.tranches.get_mut(draw.tranche).capital = draw.capital_after;
        if state.available_capital(draw.tranche).is_zero() {
            let units = state.write_off_units(draw.tranche);
            if !units.is_zero() {
                warn!(claim_ref, tranche = %draw.tranche, %units, "tranche wiped out, units written off");
            }
        }
    }
    state.total_capital = total_capital;
    state.accumulated_losses = accumulated_losses;
    state.unpaid_shortfall = unpaid_shortfall;
    state.breaker.commit(projection);
    state.processed_claims.insert(claim_ref.to_string());

    let mut outbound = Vec::new();
    let status = if plan.is_solvent() {
        info!(claim_ref, absorbed = %plan.absorbed, "claim paid");
        ClaimStatus::Paid
    } else {
        error!(
            claim_ref,
            absorbed = %plan.absorbed,
            shortfall = %plan.shortfall,
            "claim exceeds available capital"
        );
        outbound.push(Outbound::ProtocolInsolvency {
            to: state.roles.admin.clone(),
            claim_ref: claim_ref.to_string(),
            shortfall: plan.shortfall,
        });
        if config.pause_on_insolvency && !state.paused {
            state.paused = true;
            outbound.push(Outbound::PauseChanged {
                to: state.roles.admin.clone(),
                paused: true,
            });
        }
        ClaimStatus::Insolvent {
            shortfall: plan.shortfall,
        }
    };

    outbound.push(Outbound::ClaimAck {
        to: sender.clone(),
        claim_ref: claim_ref.to_string(),
        status: status.clone(),
        paid: plan.absorbed,
        unpaid: plan.shortfall,
    });

    Ok(Outcome {
        reply: Reply::Claim(ClaimReceipt {
            claim_ref: claim_ref.to_string(),
            requested: plan.requested,
            absorbed: plan.absorbed,
            draws: plan.draws,
            status,
        }),
        outbound,
    })
}
