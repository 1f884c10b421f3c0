//! Journal errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Out of order record: expected sequence {expected}, got {found}")]
    OutOfOrder { expected: u64, found: u64 },
}
