//! TrancheVault Bus - the vault as an actor
//!
//! One tokio task owns the `VaultState`. Callers talk to it through a
//! `VaultHandle`: envelopes and queries go over an mpsc mailbox and are
//! answered on a oneshot, outbound messages included. `Collaborator`s
//! react to the messages addressed to them and may answer with new
//! envelopes.

pub mod actor;
pub mod collaborator;
pub mod error;

pub use actor::{VaultActor, VaultHandle};
pub use collaborator::{Collaborator, PayoutConfirmer};
pub use error::BusError;
