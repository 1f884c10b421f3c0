//! Vault errors
//!
//! Every variant aborts the operation that raised it; no partial state is
//! ever kept. `code()` gives the stable failure code reported to callers.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tranchevault_core::{Amount, TrancheId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Unauthorized: {caller} cannot perform {action}")]
    Unauthorized { caller: String, action: String },

    #[error("Vault is paused")]
    Paused,

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Amount, required: Amount },

    #[error("Circuit breaker triggered: window losses would reach {projected}, cap {cap}")]
    CircuitBreakerTriggered { projected: Amount, cap: Amount },

    #[error("Reentrancy detected: another mutating operation is in progress")]
    ReentrancyDetected,

    #[error("Tranche {tranche} locked until {locked_until}: only {unlocked} withdrawable")]
    LockViolation {
        tranche: TrancheId,
        locked_until: DateTime<Utc>,
        unlocked: Amount,
    },

    #[error("Pending operation not found: seq {0}")]
    PendingNotFound(u64),

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),
}

impl VaultError {
    /// Stable failure code
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::Unauthorized { .. } => "unauthorized",
            VaultError::Paused => "paused",
            VaultError::InvalidParams(_) | VaultError::Overflow(_) => "invalid_params",
            VaultError::InsufficientBalance { .. } => "insufficient_balance",
            VaultError::CircuitBreakerTriggered { .. } => "circuit_breaker_triggered",
            VaultError::ReentrancyDetected => "reentrancy_detected",
            VaultError::LockViolation { .. } => "lock_violation",
            VaultError::PendingNotFound(_) => "pending_not_found",
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        VaultError::InvalidParams(msg.into())
    }
}
