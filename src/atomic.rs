//! Atomic Operation Module
//!
//! Groups the page operations of one unit of work under a single
//! `OperationUnitId` and either logs them together or reverses them.
//!
//! ## Lifecycle
//! ```text
//! begin ──▶ capture(handle)* ──┬──▶ commit(log)          UnitStart, records, UnitEnd
//!                              ├──▶ rollback(pages)      undo in reverse order
//!                              └──▶ abort(pages, log)    undo, then UnitEnd(rolled back)
//! ```
//!
//! A failed commit keeps every captured record, so the unit can still be
//! committed again (resuming after the last record that reached the log) or
//! rolled back.

use tracing::{debug, warn};

use crate::error::{PageWalError, Result};
use crate::operation::{OperationUnitId, PageOperation};
use crate::page::{PageHandle, PageHandleProvider};
use crate::wal::{LogRecord, LogSink};

/// LSN range written for a committed unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    pub unit_id: OperationUnitId,
    pub first_lsn: u64,
    pub last_lsn: u64,
    pub records: usize,
}

/// One atomic unit of work in progress
#[derive(Debug)]
pub struct AtomicOperation {
    unit_id: OperationUnitId,
    records: Vec<PageOperation>,

    /// LSN of the start marker once it reached the log
    start_lsn: Option<u64>,

    /// Records already appended to the log
    logged: usize,

    committed: bool,
}

impl AtomicOperation {
    /// Start a unit with a freshly generated id
    pub fn begin() -> Self {
        Self {
            unit_id: OperationUnitId::generate(),
            records: Vec::new(),
            start_lsn: None,
            logged: 0,
            committed: false,
        }
    }

    pub fn unit_id(&self) -> OperationUnitId {
        self.unit_id
    }

    /// Captured records in application order
    pub fn records(&self) -> &[PageOperation] {
        &self.records
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Move the handle's pending operations into this unit
    ///
    /// Returns how many were captured.
    pub fn capture(&mut self, handle: &mut PageHandle) -> usize {
        let mut operations = handle.take_page_operations();
        let captured = operations.len();
        for operation in &mut operations {
            operation.set_unit_id(self.unit_id);
        }
        self.records.append(&mut operations);
        captured
    }

    /// Append the unit to the log framed by start and end markers
    ///
    /// On error the records stay with the unit. Calling `commit` again
    /// continues after the last record the log accepted; `rollback` or
    /// `abort` reverse the pages instead.
    pub fn commit(&mut self, log: &mut dyn LogSink) -> Result<CommitInfo> {
        if self.committed {
            return Err(PageWalError::UnitCommitted { unit: self.unit_id });
        }

        let first_lsn = match self.start_lsn {
            Some(lsn) => lsn,
            None => {
                let lsn = log.append(LogRecord::UnitStart {
                    unit_id: self.unit_id,
                })?;
                self.start_lsn = Some(lsn);
                lsn
            }
        };
        while let Some(operation) = self.records.get(self.logged) {
            log.append(LogRecord::PageOperation(operation.clone()))?;
            self.logged += 1;
        }
        let last_lsn = log.append(LogRecord::UnitEnd {
            unit_id: self.unit_id,
            rolled_back: false,
        })?;
        log.sync()?;
        self.committed = true;

        let records = self.records.len();
        debug!(unit = %self.unit_id, records, first_lsn, last_lsn, "operation unit committed");
        Ok(CommitInfo {
            unit_id: self.unit_id,
            first_lsn,
            last_lsn,
            records,
        })
    }

    /// Reverse every captured record, newest first
    ///
    /// Pages are resolved through `pages`; nothing may have touched them
    /// since the records were captured. Nothing is logged. Returns how many
    /// records were undone.
    pub fn rollback(self, pages: &mut dyn PageHandleProvider) -> Result<usize> {
        let undone = self.undo_records(pages)?;
        debug!(unit = %self.unit_id, records = undone, "operation unit rolled back");
        Ok(undone)
    }

    /// Reverse every captured record, then mark the unit rolled back in the log
    ///
    /// Records that already reached the log through a failed commit are
    /// skipped by replay once the rolled-back end marker follows them.
    pub fn abort(self, pages: &mut dyn PageHandleProvider, log: &mut dyn LogSink) -> Result<usize> {
        let undone = self.undo_records(pages)?;

        if self.start_lsn.is_none() {
            log.append(LogRecord::UnitStart {
                unit_id: self.unit_id,
            })?;
        }
        log.append(LogRecord::UnitEnd {
            unit_id: self.unit_id,
            rolled_back: true,
        })?;
        log.sync()?;

        debug!(unit = %self.unit_id, records = undone, "operation unit aborted");
        Ok(undone)
    }

    fn undo_records(&self, pages: &mut dyn PageHandleProvider) -> Result<usize> {
        if self.committed {
            warn!(unit = %self.unit_id, "refusing to undo a committed operation unit");
            return Err(PageWalError::UnitCommitted { unit: self.unit_id });
        }

        for operation in self.records.iter().rev() {
            let handle = pages.load_page(operation.page_id())?;
            operation.undo(handle)?;
        }
        Ok(self.records.len())
    }
}
