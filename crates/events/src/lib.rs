//! TrancheVault Events - JSONL journal
//!
//! Every accepted mutating envelope is appended to a JSONL file, one file
//! per UTC day. The journal is the source of truth: vault state is rebuilt
//! by replaying it through the same dispatch that produced it.

pub mod error;
pub mod reader;
pub mod record;
pub mod store;

pub use error::EventError;
pub use reader::EventReader;
pub use record::JournalRecord;
pub use store::EventStore;
