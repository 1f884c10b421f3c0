//! Bus errors

use thiserror::Error;

/// Errors talking to the vault actor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Vault mailbox closed")]
    MailboxClosed,

    #[error("Vault dropped the reply")]
    ReplyDropped,
}
