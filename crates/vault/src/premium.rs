//! Premium distribution and coverage accounting

use chrono::{DateTime, Utc};
use tracing::info;
use tranchevault_core::{Amount, TrancheId};

use crate::config::VaultConfig;
use crate::dispatch::Outcome;
use crate::error::VaultError;
use crate::message::{Outbound, PremiumSplit, Reply};
use crate::state::VaultState;

const BPS_DENOMINATOR: u128 = 10_000;

/// Split `net` by percentage, senior first.
///
/// Shares are floored; the dust goes to the tranche with the largest
/// percentage, the most senior one on a tie.
pub fn split_by_allocation(net: Amount, allocation: &[u8; 6]) -> Option<Vec<(TrancheId, Amount)>> {
    let mut shares = Vec::with_capacity(TrancheId::ALL.len());
    let mut distributed = Amount::ZERO;
    for (id, pct) in TrancheId::ALL.into_iter().zip(allocation) {
        let share = net.mul_div_floor(u128::from(*pct), 100)?;
        distributed = distributed.checked_add(&share)?;
        shares.push((id, share));
    }

    let dust = net.checked_sub(&distributed)?;
    if !dust.is_zero() {
        let mut largest = 0;
        for (i, pct) in allocation.iter().enumerate() {
            if *pct > allocation[largest] {
                largest = i;
            }
        }
        shares[largest].1 = shares[largest].1.checked_add(&dust)?;
    }
    Some(shares)
}

pub(crate) fn distribute_premium(
    state: &mut VaultState,
    config: &VaultConfig,
    amount: Amount,
    allocation: Option<[u8; 6]>,
    now: DateTime<Utc>,
) -> Result<Outcome, VaultError> {
    if amount.is_zero() {
        return Err(VaultError::invalid("premium amount must be positive"));
    }

    let allocation = match allocation {
        Some(pcts) => pcts,
        None => {
            let mut pcts = [0u8; 6];
            for (slot, tranche) in pcts.iter_mut().zip(state.tranches().iter()) {
                *slot = tranche.target_allocation_pct;
            }
            pcts
        }
    };
    let total_pct: u32 = allocation.iter().map(|p| u32::from(*p)).sum();
    if total_pct != 100 {
        return Err(VaultError::invalid(format!(
            "allocation sums to {}%, expected 100%",
            total_pct
        )));
    }

    let protocol_fee = amount
        .mul_div_floor(u128::from(config.protocol_fee_bps), BPS_DENOMINATOR)
        .ok_or(VaultError::Overflow("protocol fee"))?;
    let net = amount
        .checked_sub(&protocol_fee)
        .ok_or(VaultError::Overflow("protocol fee"))?;
    let shares =
        split_by_allocation(net, &allocation).ok_or(VaultError::Overflow("premium split"))?;

    let total_capital = state
        .total_capital
        .checked_add(&net)
        .ok_or(VaultError::Overflow("total capital"))?;
    let accumulated_premiums = state
        .accumulated_premiums
        .checked_add(&amount)
        .ok_or(VaultError::Overflow("accumulated premiums"))?;
    let protocol_earned_capital = state
        .protocol_earned_capital
        .checked_add(&protocol_fee)
        .ok_or(VaultError::Overflow("protocol earned capital"))?;
    for (id, share) in &shares {
        state
            .tranche_capital(*id)
            .checked_add(share)
            .ok_or(VaultError::Overflow("tranche capital"))?;
    }

    // Commit
    for (id, share) in &shares {
        state.tranches.inject(*id, *share, now)?;
    }
    state.total_capital = total_capital;
    state.accumulated_premiums = accumulated_premiums;
    state.protocol_earned_capital = protocol_earned_capital;

    info!(%amount, %protocol_fee, %net, "premium distributed");

    Ok(Outcome {
        reply: Reply::PremiumDistributed(PremiumSplit {
            amount,
            protocol_fee,
            shares,
        }),
        outbound: vec![Outbound::PremiumAck {
            to: state.roles.float_manager.clone(),
            amount,
        }],
    })
}

pub(crate) fn record_coverage(state: &mut VaultState, amount: Amount) -> Result<Outcome, VaultError> {
    if amount.is_zero() {
        return Err(VaultError::invalid("coverage amount must be positive"));
    }
    state.total_coverage_sold = state
        .total_coverage_sold
        .checked_add(&amount)
        .ok_or(VaultError::Overflow("total coverage sold"))?;

    info!(%amount, total = %state.total_coverage_sold, "coverage recorded");

    Ok(Outcome::reply(Reply::CoverageRecorded {
        total_coverage_sold: state.total_coverage_sold,
    }))
}
