//! Replay Module
//!
//! Recovery entry points that apply logged page operations through a
//! `PageHandleProvider`.
//!
//! ## Responsibilities
//! - `redo` / `undo` of a single record against the page it names
//! - Forward replay of every committed unit found in the log
//! - Reverse replay of one unit

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::Result;
use crate::operation::{OperationUnitId, PageOperation};
use crate::page::PageHandleProvider;
use crate::wal::{LogRecord, WalEntry};

/// Outcome of a forward replay pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Page operations applied
    pub operations_applied: u64,

    /// Units whose operations were applied
    pub units_committed: u64,

    /// Units that ended with a rollback marker
    pub units_rolled_back: u64,

    /// Units with no end marker in the log
    pub units_incomplete: u64,
}

/// Re-apply `operation` to the page it targets
pub fn redo(operation: &PageOperation, pages: &mut dyn PageHandleProvider) -> Result<()> {
    let handle = pages.load_page(operation.page_id())?;
    operation.redo(handle)
}

/// Reverse `operation` on the page it targets
pub fn undo(operation: &PageOperation, pages: &mut dyn PageHandleProvider) -> Result<()> {
    let handle = pages.load_page(operation.page_id())?;
    operation.undo(handle)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum UnitOutcome {
    Committed,
    RolledBack,
}

/// Redo, in log order, every page operation of every committed unit
///
/// Units that were rolled back or never reached their end marker are
/// skipped. Pages must be at the state the log starts from.
pub fn replay_committed(
    entries: &[WalEntry],
    pages: &mut dyn PageHandleProvider,
) -> Result<ReplayStats> {
    let mut outcomes: HashMap<OperationUnitId, UnitOutcome> = HashMap::new();
    let mut started: Vec<OperationUnitId> = Vec::new();
    for entry in entries {
        match &entry.record {
            LogRecord::UnitStart { unit_id } => started.push(*unit_id),
            LogRecord::UnitEnd {
                unit_id,
                rolled_back,
            } => {
                let outcome = if *rolled_back {
                    UnitOutcome::RolledBack
                } else {
                    UnitOutcome::Committed
                };
                outcomes.insert(*unit_id, outcome);
            }
            LogRecord::PageOperation(_) => {}
        }
    }

    let mut stats = ReplayStats::default();
    for unit_id in &started {
        match outcomes.get(unit_id) {
            Some(UnitOutcome::Committed) => stats.units_committed += 1,
            Some(UnitOutcome::RolledBack) => stats.units_rolled_back += 1,
            None => stats.units_incomplete += 1,
        }
    }

    for entry in entries {
        if let LogRecord::PageOperation(operation) = &entry.record {
            if outcomes.get(&operation.unit_id()) == Some(&UnitOutcome::Committed) {
                redo(operation, pages)?;
                stats.operations_applied += 1;
            }
        }
    }

    info!(
        applied = stats.operations_applied,
        committed = stats.units_committed,
        rolled_back = stats.units_rolled_back,
        incomplete = stats.units_incomplete,
        "WAL replay finished"
    );
    Ok(stats)
}

/// Undo, newest first, every page operation logged for `unit_id`
///
/// Returns how many records were reversed.
pub fn rollback_unit(
    entries: &[WalEntry],
    unit_id: OperationUnitId,
    pages: &mut dyn PageHandleProvider,
) -> Result<usize> {
    let mut undone = 0;
    for entry in entries.iter().rev() {
        if let LogRecord::PageOperation(operation) = &entry.record {
            if operation.unit_id() == unit_id {
                undo(operation, pages)?;
                undone += 1;
            }
        }
    }

    debug!(unit = %unit_id, undone, "operation unit reversed from log");
    Ok(undone)
}
