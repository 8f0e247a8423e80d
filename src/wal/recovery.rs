//! WAL Recovery
//!
//! Scans a WAL file after a crash and reports what can be trusted.

use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;

use super::reader::{ReadOutcome, WalReader};
use super::WalEntry;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries found (scanning stops at the first)
    pub entries_corrupted: u64,

    /// Last valid LSN, 0 when nothing was recovered
    pub last_lsn: u64,

    /// Whether anything after the last valid entry must be cut off
    pub was_truncated: bool,

    /// Length of the valid prefix of the file in bytes
    pub valid_bytes: u64,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries in order
    /// 2. Stop at the first corrupted entry or torn tail
    /// 3. Report where the valid prefix ends
    ///
    /// The file itself is left untouched; `WalWriter::open` cuts the tail.
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let mut entries = Vec::new();
        let result = Self::scan(path, |entry| entries.push(entry))?;

        info!(
            path = %path.display(),
            recovered = result.entries_recovered,
            corrupted = result.entries_corrupted,
            last_lsn = result.last_lsn,
            truncated = result.was_truncated,
            "WAL recovery scan finished"
        );
        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Self::scan(path, |_| {})
    }

    fn scan(path: &Path, mut on_entry: impl FnMut(WalEntry)) -> Result<RecoveryResult> {
        let mut reader = WalReader::open(path)?;
        let mut result = RecoveryResult::default();

        loop {
            match reader.read_next()? {
                ReadOutcome::Entry(entry) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    on_entry(entry);
                }
                ReadOutcome::End => break,
                ReadOutcome::TornTail => {
                    warn!(offset = reader.position(), "partial entry at WAL tail");
                    result.was_truncated = true;
                    break;
                }
                ReadOutcome::Corrupt(err) => {
                    warn!(offset = reader.position(), error = %err, "corrupted WAL entry");
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    break;
                }
            }
        }

        result.valid_bytes = reader.position();
        Ok(result)
    }
}
