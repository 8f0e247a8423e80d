//! Log Manager Module
//!
//! Owns the WAL of one storage instance.
//!
//! ## Responsibilities
//! - Create the data directory and open `wal.log`
//! - Scan the WAL on startup and keep the recovered entries for replay
//! - Append committed and aborted operation units
//! - Truncate the WAL at checkpoints

use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::info;

use crate::atomic::{AtomicOperation, CommitInfo};
use crate::buffer::BufferPool;
use crate::config::Config;
use crate::error::Result;
use crate::page::PageHandleProvider;
use crate::wal::{RecoveryResult, WalEntry, WalRecovery, WalWriter};

/// Entry point for logging page operations
///
/// ## Concurrency
/// Commits are serialized by the WAL mutex: a unit's start marker, records
/// and end marker are contiguous in the log unless a failed commit is
/// resumed later.
pub struct LogManager {
    config: Config,
    wal_path: PathBuf,
    wal: Mutex<WalWriter>,
    recovery: RecoveryResult,
    recovered: Mutex<Vec<WalEntry>>,
}

impl LogManager {
    const WAL_FILENAME: &'static str = "wal.log";

    /// Open or create the log described by `config`
    ///
    /// On startup:
    /// 1. Validate config and create the data directory
    /// 2. Scan an existing WAL and keep its valid entries
    /// 3. Open the writer after the last valid entry
    pub fn open(config: Config) -> Result<Self> {
        // Step 1: Validate and prepare the directory
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        // Step 2: Recover whatever the previous run left behind
        let (recovered, recovery) = if wal_path.exists() {
            WalRecovery::recover(&wal_path)?
        } else {
            (Vec::new(), RecoveryResult::default())
        };

        // Step 3: Open the writer (cuts an invalid tail)
        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;

        info!(
            data_dir = %config.data_dir.display(),
            page_size = config.page_size,
            recovered = recovery.entries_recovered,
            next_lsn = wal.current_lsn(),
            "log manager opened"
        );

        Ok(Self {
            config,
            wal_path,
            wal: Mutex::new(wal),
            recovery,
            recovered: Mutex::new(recovered),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn wal_path(&self) -> &PathBuf {
        &self.wal_path
    }

    /// Buffer pool sized for this instance's pages
    pub fn new_buffer_pool(&self) -> Result<BufferPool> {
        BufferPool::new(self.config.page_size)
    }

    /// Statistics from the startup scan
    pub fn recovery_result(&self) -> &RecoveryResult {
        &self.recovery
    }

    /// Hand out the entries recovered at startup; later calls get nothing
    pub fn take_recovered(&self) -> Vec<WalEntry> {
        std::mem::take(&mut *self.recovered.lock())
    }

    /// Log a unit of work
    ///
    /// A failed commit leaves the unit's records in place for a retry or an
    /// `abort`.
    pub fn commit(&self, operation: &mut AtomicOperation) -> Result<CommitInfo> {
        let mut wal = self.wal.lock();
        operation.commit(&mut *wal)
    }

    /// Undo a unit's page changes and log it as rolled back
    pub fn abort(
        &self,
        operation: AtomicOperation,
        pages: &mut dyn PageHandleProvider,
    ) -> Result<usize> {
        let mut wal = self.wal.lock();
        operation.abort(pages, &mut *wal)
    }

    /// Force the WAL to disk
    pub fn sync(&self) -> Result<()> {
        self.wal.lock().sync()
    }

    /// LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.wal.lock().current_lsn()
    }

    /// Discard the log once every logged page is durable elsewhere
    pub fn checkpoint(&self) -> Result<()> {
        let mut wal = self.wal.lock();
        wal.sync()?;
        wal.truncate()?;
        info!(path = %self.wal_path.display(), "checkpoint: WAL truncated");
        Ok(())
    }

    /// Sync and close the log
    pub fn close(self) -> Result<()> {
        self.wal.lock().sync()
    }
}
