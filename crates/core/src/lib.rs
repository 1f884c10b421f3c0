//! TrancheVault Core - Domain types
//!
//! This crate contains the fundamental types used across TrancheVault:
//! - `Amount`: Non-negative 9-decimal fixed-point amount
//! - `TrancheId`: The six risk tranches and their seniority order
//! - `AccountId`: Identity of a depositor or protocol collaborator

pub mod account;
pub mod amount;
pub mod tranche;

pub use account::{AccountId, AccountIdError};
pub use amount::{Amount, AmountError, DECIMALS, MIN_DEPOSIT};
pub use tranche::{TrancheId, TrancheIdError};
