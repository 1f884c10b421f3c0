//! Journal record

use serde::{Deserialize, Serialize};
use tranchevault_vault::Envelope;

/// One accepted envelope and its position in the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Starts at 1, no gaps
    pub sequence: u64,
    pub envelope: Envelope,
}

impl JournalRecord {
    pub fn new(sequence: u64, envelope: Envelope) -> Self {
        Self { sequence, envelope }
    }
}
