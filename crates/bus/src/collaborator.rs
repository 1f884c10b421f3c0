//! Collaborators - external roles reacting to outbound messages

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;
use tranchevault_core::AccountId;
use tranchevault_vault::{Envelope, Operation, Outbound};

use crate::error::BusError;

/// A party the vault sends messages to
///
/// Implementations see only messages addressed to `address()` and answer
/// with zero or more envelopes, which are submitted back to the vault.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Name for logging
    fn name(&self) -> &str;

    /// Account the collaborator acts as
    fn address(&self) -> &AccountId;

    /// React to `message`, emitted while handling an envelope stamped `at`
    async fn on_message(
        &self,
        at: DateTime<Utc>,
        message: &Outbound,
    ) -> Result<Vec<Envelope>, BusError>;
}

/// Float manager stand-in that pays every payout request
pub struct PayoutConfirmer {
    address: AccountId,
}

impl PayoutConfirmer {
    pub fn new(address: impl Into<AccountId>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Collaborator for PayoutConfirmer {
    fn name(&self) -> &str {
        "payout-confirmer"
    }

    fn address(&self) -> &AccountId {
        &self.address
    }

    async fn on_message(
        &self,
        at: DateTime<Utc>,
        message: &Outbound,
    ) -> Result<Vec<Envelope>, BusError> {
        match message {
            Outbound::PayoutRequest {
                seq_no,
                depositor,
                amount,
                ..
            } => {
                info!(seq_no, depositor = %depositor, %amount, "paying out");
                Ok(vec![Envelope::new(
                    self.address.clone(),
                    at,
                    Operation::ConfirmPayout {
                        seq_no: *seq_no,
                        success: true,
                    },
                )])
            }
            _ => Ok(Vec::new()),
        }
    }
}
