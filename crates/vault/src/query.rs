//! Read-only queries
//!
//! Queries never take the reentrancy guard and never mutate state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tranchevault_core::{AccountId, Amount, TrancheId};
use tranchevault_curves::{years_between, Nav};

use crate::pending::PendingTx;
use crate::state::VaultState;

/// APY bounds of a tranche in basis points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApyBounds {
    pub min_bps: u32,
    pub max_bps: u32,
}

/// A depositor's holding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositorPosition {
    pub depositor: AccountId,
    pub tranche: TrancheId,
    pub units: Amount,
    pub deposited_at: DateTime<Utc>,
    /// Curve NAV accrued since `deposited_at`: the return the tranche
    /// targets, not what it holds
    pub nav: Nav,
    /// Pro-rata share of the unreserved tranche capital, rounded down.
    /// This is the most a withdrawal can take.
    pub value: Amount,
}

/// Snapshot line of one tranche
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheReport {
    pub tranche: TrancheId,
    pub capital: Amount,
    pub reserved: Amount,
    pub units: Amount,
    pub nav: Nav,
    pub apy: ApyBounds,
    /// Effective APY on the curve right now (basis points)
    pub current_apy_bps: Decimal,
}

/// Aggregate snapshot of the vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultReport {
    pub at: DateTime<Utc>,
    pub total_capital: Amount,
    pub total_coverage_sold: Amount,
    pub accumulated_premiums: Amount,
    pub accumulated_losses: Amount,
    pub protocol_earned_capital: Amount,
    pub unpaid_shortfall: Amount,
    pub paused: bool,
    pub pending_count: usize,
    pub breaker_window_losses: Amount,
    pub tranches: Vec<TrancheReport>,
}

impl VaultReport {
    pub fn build(state: &VaultState, at: DateTime<Utc>) -> Self {
        let tranches = state
            .tranches()
            .iter()
            .map(|t| {
                let years = t
                    .deposit_timestamp
                    .map(|origin| years_between(origin, at))
                    .unwrap_or(Decimal::ZERO);
                TrancheReport {
                    tranche: t.id,
                    capital: t.capital,
                    reserved: state.reserved(t.id),
                    units: t.units,
                    nav: t.nav(at),
                    apy: state.tranche_apy(t.id),
                    current_apy_bps: t.curve.effective_apy_bps(years).round_dp(4),
                }
            })
            .collect();

        Self {
            at,
            total_capital: state.total_capital(),
            total_coverage_sold: state.total_coverage_sold(),
            accumulated_premiums: state.accumulated_premiums(),
            accumulated_losses: state.accumulated_losses(),
            protocol_earned_capital: state.protocol_earned_capital(),
            unpaid_shortfall: state.unpaid_shortfall(),
            paused: state.paused(),
            pending_count: state.pending_txs().count(),
            breaker_window_losses: state.breaker().window_losses(),
            tranches,
        }
    }
}

/// Read-only query set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    TrancheCapital { tranche: TrancheId },
    TrancheApy { tranche: TrancheId },
    TrancheNav { tranche: TrancheId },
    TotalCapital,
    AccumulatedPremiums,
    AccumulatedLosses,
    ProtocolEarnedCapital,
    TotalCoverageSold,
    Paused,
    DepositorPosition { depositor: AccountId, tranche: TrancheId },
    Pending { seq_no: u64 },
    Report,
}

/// Answer to a `Query`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Amount(Amount),
    Apy(ApyBounds),
    Nav(Nav),
    Flag(bool),
    Position(Option<DepositorPosition>),
    Pending(Option<PendingTx>),
    Report(Box<VaultReport>),
}

/// Value a depositor's holding at `at`
pub fn depositor_position(
    state: &VaultState,
    depositor: &AccountId,
    tranche: TrancheId,
    at: DateTime<Utc>,
) -> Option<DepositorPosition> {
    let balance = state.depositor_balance(depositor, tranche)?;
    let nav = state
        .tranche(tranche)
        .curve
        .nav(years_between(balance.deposited_at, at));
    let value = state.units_value(tranche, balance.units)?;

    Some(DepositorPosition {
        depositor: depositor.clone(),
        tranche,
        units: balance.units,
        deposited_at: balance.deposited_at,
        nav,
        value,
    })
}

/// Evaluate a query against the state at `at`
pub fn query(state: &VaultState, at: DateTime<Utc>, q: &Query) -> QueryResponse {
    match q {
        Query::TrancheCapital { tranche } => QueryResponse::Amount(state.tranche_capital(*tranche)),
        Query::TrancheApy { tranche } => QueryResponse::Apy(state.tranche_apy(*tranche)),
        Query::TrancheNav { tranche } => QueryResponse::Nav(state.tranche_nav(*tranche, at)),
        Query::TotalCapital => QueryResponse::Amount(state.total_capital()),
        Query::AccumulatedPremiums => QueryResponse::Amount(state.accumulated_premiums()),
        Query::AccumulatedLosses => QueryResponse::Amount(state.accumulated_losses()),
        Query::ProtocolEarnedCapital => QueryResponse::Amount(state.protocol_earned_capital()),
        Query::TotalCoverageSold => QueryResponse::Amount(state.total_coverage_sold()),
        Query::Paused => QueryResponse::Flag(state.paused()),
        Query::DepositorPosition { depositor, tranche } => {
            QueryResponse::Position(depositor_position(state, depositor, *tranche, at))
        }
        Query::Pending { seq_no } => QueryResponse::Pending(state.pending(*seq_no).cloned()),
        Query::Report => QueryResponse::Report(Box::new(VaultReport::build(state, at))),
    }
}
