//! Pending multi-step operations
//!
//! An operation that needs a collaborator's answer is split in two
//! invocations. Phase one records a `PendingTx` under a fresh sequence
//! number and reserves capital in the tranche's `TrancheLock`; phase two
//! (confirmation, cancellation or timeout sweep) settles or rolls back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tranchevault_core::{AccountId, Amount, TrancheId};

/// What the pending operation is waiting for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    /// Payout of a withdrawal by the float manager
    Withdrawal,
}

/// In-flight operation awaiting an external confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTx {
    pub seq_no: u64,
    pub kind: PendingKind,
    pub depositor: AccountId,
    pub tranche: TrancheId,
    pub amount: Amount,
    /// Depositor's accrual origin before phase one, restored on rollback
    pub deposited_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PendingTx {
    /// Older than `timeout` at `now`
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        self.created_at
            .checked_add_signed(timeout)
            .is_some_and(|deadline| now >= deadline)
    }
}

/// Capital of one tranche reserved by in-flight operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheLock {
    pub reserved: Amount,
    pub seq_nos: BTreeSet<u64>,
}

impl TrancheLock {
    pub(crate) fn reserve(&mut self, seq_no: u64, amount: Amount) -> Option<()> {
        self.reserved = self.reserved.checked_add(&amount)?;
        self.seq_nos.insert(seq_no);
        Some(())
    }

    pub(crate) fn release(&mut self, seq_no: u64, amount: Amount) {
        self.reserved = self.reserved.saturating_sub(&amount);
        self.seq_nos.remove(&seq_no);
    }

    pub fn is_empty(&self) -> bool {
        self.seq_nos.is_empty() && self.reserved.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry() {
        let created_at = Utc::now();
        let tx = PendingTx {
            seq_no: 1,
            kind: PendingKind::Withdrawal,
            depositor: AccountId::from("alice"),
            tranche: TrancheId::Btc,
            amount: Amount::from_units(1),
            deposited_at: created_at,
            created_at,
        };

        assert!(!tx.is_expired(created_at + Duration::minutes(59), Duration::hours(1)));
        assert!(tx.is_expired(created_at + Duration::hours(1), Duration::hours(1)));
        assert!(!tx.is_expired(created_at + Duration::days(1), Duration::MAX));
    }

    #[test]
    fn test_lock_reserve_release() {
        let mut lock = TrancheLock::default();
        lock.reserve(1, Amount::from_units(4)).unwrap();
        lock.reserve(2, Amount::from_units(6)).unwrap();
        assert_eq!(lock.reserved, Amount::from_units(10));

        lock.release(1, Amount::from_units(4));
        assert_eq!(lock.reserved, Amount::from_units(6));
        assert!(!lock.is_empty());

        lock.release(2, Amount::from_units(6));
        assert!(lock.is_empty());
    }
}
