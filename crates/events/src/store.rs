//! JSONL journal - append-only writer

use crate::error::EventError;
use crate::reader::EventReader;
use crate::record::JournalRecord;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tranchevault_vault::Envelope;

/// Append-only JSONL journal, one file per UTC day of `Envelope::at`.
///
/// Sequence numbers, not file names, carry the append order.
pub struct EventStore {
    base_path: PathBuf,
    current_file: Option<BufWriter<File>>,
    current_date: Option<String>,
    last_sequence: u64,
}

impl EventStore {
    /// Open (or create) the journal at `base_path`, continuing its sequence
    pub fn open(base_path: impl AsRef<Path>) -> Result<Self, EventError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        let last_sequence = EventReader::from_directory(&base_path)?
            .last_sequence()?
            .unwrap_or(0);

        Ok(Self {
            base_path,
            current_file: None,
            current_date: None,
            last_sequence,
        })
    }

    /// Sequence of the last appended record (0 when empty)
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Append an accepted envelope under the next sequence number
    pub fn append(&mut self, envelope: &Envelope) -> Result<JournalRecord, EventError> {
        let record = JournalRecord::new(self.last_sequence + 1, envelope.clone());
        let date = envelope.at.format("%Y-%m-%d").to_string();

        // Rotate file if date changed
        if self.current_date.as_ref() != Some(&date) {
            self.rotate_file(&date)?;
        }

        if let Some(ref mut writer) = self.current_file {
            let json = serde_json::to_string(&record)?;
            writeln!(writer, "{}", json)?;
            writer.flush()?;
        }

        self.last_sequence = record.sequence;
        debug!(sequence = record.sequence, op = envelope.op.name(), "journal append");
        Ok(record)
    }

    fn rotate_file(&mut self, date: &str) -> Result<(), EventError> {
        if let Some(ref mut writer) = self.current_file {
            writer.flush()?;
        }

        let file_path = self.base_path.join(format!("{}.jsonl", date));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;

        self.current_file = Some(BufWriter::new(file));
        self.current_date = Some(date.to_string());

        Ok(())
    }

    /// List all JSONL files in the journal
    pub fn list_files(&self) -> Result<Vec<PathBuf>, EventError> {
        EventReader::from_directory(&self.base_path).map(|reader| reader.files().to_vec())
    }

    /// Flush and close the current file
    pub fn close(&mut self) -> Result<(), EventError> {
        if let Some(ref mut writer) = self.current_file {
            writer.flush()?;
        }
        self.current_file = None;
        self.current_date = None;
        Ok(())
    }
}

impl Drop for EventStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;
    use tranchevault_core::{Amount, TrancheId};
    use tranchevault_vault::Operation;

    fn envelope(at: chrono::DateTime<Utc>) -> Envelope {
        Envelope::new(
            "alice",
            at,
            Operation::Deposit {
                tranche: TrancheId::Btc,
                amount: Amount::from_units(1),
            },
        )
    }

    #[test]
    fn test_append_assigns_sequence() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::open(dir.path()).unwrap();
        let now = Utc::now();

        assert_eq!(store.append(&envelope(now)).unwrap().sequence, 1);
        assert_eq!(store.append(&envelope(now)).unwrap().sequence, 2);
        assert_eq!(store.last_sequence(), 2);
    }

    #[test]
    fn test_rotates_per_day() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::open(dir.path()).unwrap();
        let day_one = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();

        store.append(&envelope(day_one)).unwrap();
        store.append(&envelope(day_one + Duration::hours(2))).unwrap();

        let files = store.list_files().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("2026-03-01.jsonl"));
        assert!(files[1].ends_with("2026-03-02.jsonl"));
    }

    #[test]
    fn test_reopen_continues_sequence() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = EventStore::open(dir.path()).unwrap();
            store.append(&envelope(Utc::now())).unwrap();
            store.append(&envelope(Utc::now())).unwrap();
        }

        let mut store = EventStore::open(dir.path()).unwrap();
        assert_eq!(store.last_sequence(), 2);
        assert_eq!(store.append(&envelope(Utc::now())).unwrap().sequence, 3);
    }
}
