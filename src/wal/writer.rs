//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::config::WalSyncStrategy;
use crate::error::{PageWalError, Result};

use super::{LogRecord, WalEntry, WalRecovery};

/// Destination for the records of committed and aborted operation units
pub trait LogSink {
    /// Append one record, returning its LSN
    fn append(&mut self, record: LogRecord) -> Result<u64>;

    /// Make every appended record durable
    fn sync(&mut self) -> Result<()>;
}

/// Writes entries to the WAL file
///
/// Opening an existing file continues after its last valid entry; a torn or
/// corrupted tail is cut off first.
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,

    /// LSN the next append receives
    next_lsn: u64,

    sync_strategy: WalSyncStrategy,

    /// Entries appended since the last fsync
    uncommitted: usize,
}

impl WalWriter {
    /// Open or create a WAL file
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let scan = WalRecovery::verify(path)?;
        if scan.was_truncated {
            warn!(
                path = %path.display(),
                valid_bytes = scan.valid_bytes,
                "cutting invalid WAL tail"
            );
            file.set_len(scan.valid_bytes)?;
            file.sync_all()?;
        }

        let mut writer = BufWriter::new(file);
        writer.seek(SeekFrom::Start(scan.valid_bytes))?;

        debug!(path = %path.display(), next_lsn = scan.last_lsn + 1, "WAL opened");
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            next_lsn: scan.last_lsn + 1,
            sync_strategy,
            uncommitted: 0,
        })
    }

    /// Append a record to the WAL, returning its LSN
    pub fn append(&mut self, record: LogRecord) -> Result<u64> {
        let lsn = self.next_lsn;
        let bytes = WalEntry::new(lsn, record).serialize()?;

        self.writer
            .write_all(&bytes)
            .map_err(|e| PageWalError::WalWrite(format!("append at LSN {} failed: {}", lsn, e)))?;
        self.next_lsn += 1;
        self.uncommitted += 1;
        trace!(lsn, bytes = bytes.len(), "WAL entry appended");

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.uncommitted >= count,
        };
        if due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        if self.uncommitted > 0 {
            trace!(entries = self.uncommitted, "WAL synced");
        }
        self.uncommitted = 0;
        Ok(())
    }

    /// Drop every entry and restart LSNs at 1
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;

        self.next_lsn = 1;
        self.uncommitted = 0;
        debug!(path = %self.path.display(), "WAL truncated");
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Entries appended since the last sync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for WalWriter {
    fn append(&mut self, record: LogRecord) -> Result<u64> {
        WalWriter::append(self, record)
    }

    fn sync(&mut self) -> Result<()> {
        WalWriter::sync(self)
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            warn!(error = %e, "failed to sync WAL on close");
        }
    }
}
