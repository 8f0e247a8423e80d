//! Write-Ahead Log (WAL) Module
//!
//! Provides durability for page operations through append-only logging.
//!
//! ## Responsibilities
//! - Append operation-unit boundaries and page operation records
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering
//! - Crash recovery scan with torn-tail detection
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Data Format
//! ```text
//! unit start:      [1][unit id (16)]
//! page operation:  [2][kind tag (1)][page operation record]
//! unit end:        [3][unit id (16)][rolled_back (1)]
//! ```

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{LogRecord, WalEntry, HEADER_SIZE};
pub use reader::{WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::{LogSink, WalWriter};
