//! TrancheVault Engine
//!
//! The vault holds pooled capital in six risk tranches. Every inbound
//! operation runs through [`dispatch::handle`], which checks authorization
//! and pause state, takes the reentrancy guard, runs one engine and
//! returns the reply together with the outbound messages for collaborators.
//!
//! State lives in an explicit [`VaultState`] passed by `&mut`; there are
//! no globals.

pub mod breaker;
pub mod config;
pub mod deposit;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod message;
pub mod pending;
pub mod premium;
pub mod query;
pub mod state;
pub mod tranche;
pub mod waterfall;

pub use breaker::CircuitBreaker;
pub use config::{ConfigError, TrancheParams, VaultConfig};
pub use dispatch::{handle, Handled};
pub use error::VaultError;
pub use guard::GuardedState;
pub use message::{
    ClaimReceipt, ClaimStatus, Envelope, Operation, Outbound, PremiumSplit, Reply, Role,
};
pub use pending::{PendingKind, PendingTx, TrancheLock};
pub use query::{query, ApyBounds, DepositorPosition, Query, QueryResponse, TrancheReport, VaultReport};
pub use state::{DepositorBalance, Roles, VaultState};
pub use tranche::{TrancheConfig, TrancheRegistry};
pub use waterfall::{LossPlan, TrancheDraw};
