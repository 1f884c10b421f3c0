//! Inbound operations, replies and outbound messages
//!
//! Every call into the vault is an `Envelope`: who sent it, when, and
//! which `Operation`. The dispatcher matches the operation exhaustively and
//! answers with a `Reply` plus zero or more `Outbound` messages addressed
//! to collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tranchevault_core::{AccountId, Amount, TrancheId};

use crate::query::VaultReport;
use crate::waterfall::TrancheDraw;

/// An inbound call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: AccountId,
    /// Logical time at which the vault processes the call
    pub at: DateTime<Utc>,
    pub op: Operation,
}

impl Envelope {
    pub fn new(sender: impl Into<AccountId>, at: DateTime<Utc>, op: Operation) -> Self {
        Self {
            sender: sender.into(),
            at,
            op,
        }
    }
}

/// Inbound operation set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Deposit {
        tranche: TrancheId,
        amount: Amount,
    },
    /// Phase one of a withdrawal; settles on `ConfirmPayout`
    Withdraw {
        tranche: TrancheId,
        amount: Amount,
        /// Withdraw for another depositor (admin / float manager only)
        #[serde(default)]
        on_behalf_of: Option<AccountId>,
    },
    ConfirmPayout {
        seq_no: u64,
        success: bool,
    },
    ApplyClaim {
        amount: Amount,
        claim_ref: String,
    },
    DistributePremium {
        amount: Amount,
        /// Percentages per tranche, senior first; defaults to the targets
        #[serde(default)]
        allocation: Option<[u8; 6]>,
    },
    RecordCoverage {
        amount: Amount,
    },
    Pause,
    Unpause,
    SetFloatManager {
        address: AccountId,
    },
    SetClaimsProcessor {
        address: AccountId,
    },
    /// Set or clear (`until: None`) a tranche withdrawal lock
    SetTrancheLock {
        tranche: TrancheId,
        amount: Amount,
        #[serde(default)]
        until: Option<DateTime<Utc>>,
    },
    CancelPending {
        seq_no: u64,
    },
    SweepExpired,
    RequestReport,
}

impl Operation {
    /// Name used in logs and authorization errors
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Deposit { .. } => "deposit",
            Operation::Withdraw { .. } => "withdraw",
            Operation::ConfirmPayout { .. } => "confirm_payout",
            Operation::ApplyClaim { .. } => "apply_claim",
            Operation::DistributePremium { .. } => "distribute_premium",
            Operation::RecordCoverage { .. } => "record_coverage",
            Operation::Pause => "pause",
            Operation::Unpause => "unpause",
            Operation::SetFloatManager { .. } => "set_float_manager",
            Operation::SetClaimsProcessor { .. } => "set_claims_processor",
            Operation::SetTrancheLock { .. } => "set_tranche_lock",
            Operation::CancelPending { .. } => "cancel_pending",
            Operation::SweepExpired => "sweep_expired",
            Operation::RequestReport => "request_report",
        }
    }

    /// Whether the operation may change vault state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Operation::RequestReport)
    }
}

/// Collaborator roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    MasterFactory,
    FloatManager,
    ClaimsProcessor,
}

/// Outcome of a claim that was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Fully absorbed by the tranches
    Paid,
    /// Every tranche drained; `shortfall` remains unpaid
    Insolvent { shortfall: Amount },
    /// Rejected before any mutation
    Rejected { code: String },
}

/// Per-claim result of the loss waterfall
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub claim_ref: String,
    pub requested: Amount,
    pub absorbed: Amount,
    pub draws: Vec<TrancheDraw>,
    pub status: ClaimStatus,
}

/// How a premium was split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumSplit {
    pub amount: Amount,
    pub protocol_fee: Amount,
    /// Share credited to each tranche, senior first
    pub shares: Vec<(TrancheId, Amount)>,
}

/// Successful reply to an inbound call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Deposited {
        tranche: TrancheId,
        amount: Amount,
        /// Units minted at the current price
        units: Amount,
        tranche_capital: Amount,
    },
    WithdrawalPending {
        seq_no: u64,
        tranche: TrancheId,
        amount: Amount,
    },
    PayoutSettled {
        seq_no: u64,
        /// false when the payout failed and the withdrawal was rolled back
        paid: bool,
    },
    Claim(ClaimReceipt),
    PremiumDistributed(PremiumSplit),
    CoverageRecorded {
        total_coverage_sold: Amount,
    },
    PauseSet {
        paused: bool,
    },
    AddressUpdated {
        role: Role,
        address: AccountId,
    },
    LockSet {
        tranche: TrancheId,
    },
    PendingCancelled {
        seq_no: u64,
    },
    Swept {
        rolled_back: Vec<u64>,
    },
    ReportSent,
}

/// Message to a collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// To the claims processor
    ClaimAck {
        to: AccountId,
        claim_ref: String,
        status: ClaimStatus,
        paid: Amount,
        unpaid: Amount,
    },
    /// To the premium sender
    PremiumAck {
        to: AccountId,
        amount: Amount,
    },
    /// To the float manager: pay a depositor, then confirm by seq_no
    PayoutRequest {
        to: AccountId,
        seq_no: u64,
        depositor: AccountId,
        tranche: TrancheId,
        amount: Amount,
    },
    /// To the float manager
    VaultReport {
        to: AccountId,
        report: VaultReport,
    },
    /// To admin
    PauseChanged {
        to: AccountId,
        paused: bool,
    },
    /// To admin
    AddressUpdated {
        to: AccountId,
        role: Role,
        address: AccountId,
    },
    /// To admin: a claim exceeded all available capital
    ProtocolInsolvency {
        to: AccountId,
        claim_ref: String,
        shortfall: Amount,
    },
    /// To the float manager: do not pay this request
    PendingRolledBack {
        to: AccountId,
        seq_no: u64,
        reason: String,
    },
}

impl Outbound {
    /// Destination of the message
    pub fn recipient(&self) -> &AccountId {
        match self {
            Outbound::ClaimAck { to, .. }
            | Outbound::PremiumAck { to, .. }
            | Outbound::PayoutRequest { to, .. }
            | Outbound::VaultReport { to, .. }
            | Outbound::PauseChanged { to, .. }
            | Outbound::AddressUpdated { to, .. }
            | Outbound::ProtocolInsolvency { to, .. }
            | Outbound::PendingRolledBack { to, .. } => to,
        }
    }
}
