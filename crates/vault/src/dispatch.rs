//! Operation dispatch
//!
//! `handle` is the single entry point for inbound envelopes. Order of
//! checks: authorization, pause state, reentrancy guard, then the engine.
//! A rejected operation leaves the state untouched.

use tracing::{info, warn};
use tranchevault_core::{AccountId, Amount};

use crate::config::VaultConfig;
use crate::deposit;
use crate::error::VaultError;
use crate::guard::GuardedState;
use crate::message::{ClaimStatus, Envelope, Operation, Outbound, Reply, Role};
use crate::premium;
use crate::query::VaultReport;
use crate::state::{Roles, VaultState};
use crate::waterfall;

/// Result of one inbound envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handled {
    pub result: Result<Reply, VaultError>,
    /// Messages for collaborators, in emission order
    pub outbound: Vec<Outbound>,
}

impl Handled {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Engine output before it is wrapped into `Handled`
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) reply: Reply,
    pub(crate) outbound: Vec<Outbound>,
}

impl Outcome {
    pub(crate) fn reply(reply: Reply) -> Self {
        Self {
            reply,
            outbound: Vec::new(),
        }
    }
}

/// Process one envelope against the vault
pub fn handle(state: &mut VaultState, config: &VaultConfig, env: &Envelope) -> Handled {
    match run(state, config, env) {
        Ok(outcome) => {
            info!(
                op = env.op.name(),
                sender = %env.sender,
                outbound = outcome.outbound.len(),
                "operation committed"
            );
            debug_assert!(
                state.verify_invariants().is_ok(),
                "invariant violated after {}: {:?}",
                env.op.name(),
                state.verify_invariants()
            );
            Handled {
                result: Ok(outcome.reply),
                outbound: outcome.outbound,
            }
        }
        Err(err) => {
            warn!(
                op = env.op.name(),
                sender = %env.sender,
                code = err.code(),
                error = %err,
                "operation rejected"
            );
            let outbound = match &env.op {
                Operation::ApplyClaim { amount, claim_ref } => vec![Outbound::ClaimAck {
                    to: env.sender.clone(),
                    claim_ref: claim_ref.clone(),
                    status: ClaimStatus::Rejected {
                        code: err.code().to_string(),
                    },
                    paid: Amount::ZERO,
                    unpaid: *amount,
                }],
                _ => Vec::new(),
            };
            Handled {
                result: Err(err),
                outbound,
            }
        }
    }
}

fn run(
    state: &mut VaultState,
    config: &VaultConfig,
    env: &Envelope,
) -> Result<Outcome, VaultError> {
    authorize(state.roles(), env)?;

    if state.paused()
        && env.op.is_mutating()
        && !matches!(env.op, Operation::Pause | Operation::Unpause)
    {
        return Err(VaultError::Paused);
    }

    if !env.op.is_mutating() {
        return execute(state, config, env);
    }

    let mut guarded = GuardedState::acquire(state)?;
    execute(&mut guarded, config, env)
}

fn authorize(roles: &Roles, env: &Envelope) -> Result<(), VaultError> {
    let sender = &env.sender;
    let is = |role: &AccountId| sender == role;

    let allowed = match &env.op {
        Operation::Deposit { .. } => true,
        Operation::Withdraw { on_behalf_of, .. } => match on_behalf_of {
            Some(owner) if owner != sender => is(&roles.admin) || is(&roles.float_manager),
            _ => true,
        },
        Operation::ConfirmPayout { .. } | Operation::RequestReport => is(&roles.float_manager),
        Operation::ApplyClaim { .. } => is(&roles.claims_processor),
        Operation::DistributePremium { .. } => {
            is(&roles.float_manager) || is(&roles.master_factory)
        }
        Operation::RecordCoverage { .. } => is(&roles.master_factory),
        Operation::Pause | Operation::Unpause => is(&roles.admin) || is(&roles.master_factory),
        Operation::SetFloatManager { .. }
        | Operation::SetClaimsProcessor { .. }
        | Operation::SetTrancheLock { .. }
        | Operation::CancelPending { .. }
        | Operation::SweepExpired => is(&roles.admin),
    };

    if allowed {
        Ok(())
    } else {
        Err(VaultError::Unauthorized {
            caller: sender.to_string(),
            action: env.op.name().to_string(),
        })
    }
}

fn execute(
    state: &mut VaultState,
    config: &VaultConfig,
    env: &Envelope,
) -> Result<Outcome, VaultError> {
    let now = env.at;
    match &env.op {
        Operation::Deposit { tranche, amount } => {
            deposit::deposit(state, config, &env.sender, *tranche, *amount, now)
        }
        Operation::Withdraw {
            tranche,
            amount,
            on_behalf_of,
        } => {
            let depositor = on_behalf_of.as_ref().unwrap_or(&env.sender);
            deposit::withdraw(state, depositor, *tranche, *amount, now)
        }
        Operation::ConfirmPayout { seq_no, success } => {
            deposit::confirm_payout(state, *seq_no, *success)
        }
        Operation::ApplyClaim { amount, claim_ref } => {
            waterfall::apply_claim(state, config, &env.sender, claim_ref, *amount, now)
        }
        Operation::DistributePremium { amount, allocation } => {
            premium::distribute_premium(state, config, *amount, *allocation, now)
        }
        Operation::RecordCoverage { amount } => premium::record_coverage(state, *amount),
        Operation::Pause => Ok(set_paused(state, true)),
        Operation::Unpause => Ok(set_paused(state, false)),
        Operation::SetFloatManager { address } => {
            Ok(set_address(state, Role::FloatManager, address))
        }
        Operation::SetClaimsProcessor { address } => {
            Ok(set_address(state, Role::ClaimsProcessor, address))
        }
        Operation::SetTrancheLock {
            tranche,
            amount,
            until,
        } => deposit::set_tranche_lock(state, *tranche, *amount, *until, now),
        Operation::CancelPending { seq_no } => deposit::cancel_pending(state, *seq_no),
        Operation::SweepExpired => deposit::sweep_expired(state, config, now),
        Operation::RequestReport => Ok(Outcome {
            reply: Reply::ReportSent,
            outbound: vec![Outbound::VaultReport {
                to: state.roles.float_manager.clone(),
                report: VaultReport::build(state, now),
            }],
        }),
    }
}

fn set_paused(state: &mut VaultState, paused: bool) -> Outcome {
    let mut outcome = Outcome::reply(Reply::PauseSet { paused });
    // Idempotent; only a change is announced
    if state.paused != paused {
        state.paused = paused;
        outcome.outbound.push(Outbound::PauseChanged {
            to: state.roles.admin.clone(),
            paused,
        });
    }
    outcome
}

fn set_address(state: &mut VaultState, role: Role, address: &AccountId) -> Outcome {
    match role {
        Role::Admin => state.roles.admin = address.clone(),
        Role::MasterFactory => state.roles.master_factory = address.clone(),
        Role::FloatManager => state.roles.float_manager = address.clone(),
        Role::ClaimsProcessor => state.roles.claims_processor = address.clone(),
    }
    Outcome {
        reply: Reply::AddressUpdated {
            role,
            address: address.clone(),
        },
        outbound: vec![Outbound::AddressUpdated {
            to: state.roles.admin.clone(),
            role,
            address: address.clone(),
        }],
    }
}
