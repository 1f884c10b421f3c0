//! JSONL journal reader - sequential reader for replay

use crate::error::EventError;
use crate::record::JournalRecord;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Sequential journal reader
pub struct EventReader {
    files: Vec<PathBuf>,
}

impl EventReader {
    /// Collect the journal files of a directory, oldest first
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, EventError> {
        let path = path.as_ref();
        let mut files = Vec::new();

        if path.exists() {
            for entry in std::fs::read_dir(path)? {
                let entry = entry?;
                let file_path = entry.path();
                if file_path.extension().map_or(false, |ext| ext == "jsonl") {
                    files.push(file_path);
                }
            }
        }

        files.sort();

        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn read_file(path: &Path, records: &mut Vec<JournalRecord>) -> Result<(), EventError> {
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(())
    }

    /// Read every record in sequence order, checking the sequence has no
    /// gaps.
    ///
    /// Files are named by the logical day of their envelopes, which need
    /// not follow append order, so records are merged across files.
    pub fn read_all(&self) -> Result<Vec<JournalRecord>, EventError> {
        let mut records = Vec::new();
        for file_path in &self.files {
            Self::read_file(file_path, &mut records)?;
        }
        records.sort_by_key(|r| r.sequence);

        for (i, record) in records.iter().enumerate() {
            let expected = i as u64 + 1;
            if record.sequence != expected {
                return Err(EventError::OutOfOrder {
                    expected,
                    found: record.sequence,
                });
            }
        }

        Ok(records)
    }

    /// Highest sequence in the journal
    pub fn last_sequence(&self) -> Result<Option<u64>, EventError> {
        Ok(self.read_all()?.last().map(|r| r.sequence))
    }

    /// Count records across all files
    pub fn count(&self) -> Result<usize, EventError> {
        let mut count = 0;

        for file_path in &self.files {
            let reader = BufReader::new(File::open(file_path)?);
            for line in reader.lines() {
                if !line?.trim().is_empty() {
                    count += 1;
                }
            }
        }

        Ok(count)
    }
}
