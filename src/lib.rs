//! # pagewal
//!
//! Physical write-ahead logging for paginated B-tree buckets:
//! - Pooled, fixed-size page buffers
//! - In-place bucket mutations that record redo/undo page operations
//! - Exact binary encoding of those operations
//! - Operation units committed to a checksummed WAL
//! - Crash recovery by forward replay, rollback by reverse replay
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Bucket (leaf / non-leaf)                    │
//! │        add / remove / add_all / shrink / update / read       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ mutates bytes + pushes PageOperation
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       PageHandle                             │
//! │          PageId + PooledBuffer + pending operations          │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ capture                          │ buffer
//!            ▼                                  ▼
//!   ┌─────────────────┐                 ┌──────────────┐
//!   │ AtomicOperation │                 │  BufferPool  │
//!   │  (unit id)      │                 │  (recycling) │
//!   └────────┬────────┘                 └──────────────┘
//!            │ commit
//!            ▼
//!   ┌─────────────────┐   recover    ┌─────────────────────────┐
//!   │       WAL       │ ───────────▶ │ replay: redo / undo via  │
//!   │ (LSN, CRC32)    │              │   PageHandleProvider     │
//!   └─────────────────┘              └─────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod buffer;
pub mod page;
pub mod record_id;
pub mod serializer;
pub mod bucket;
pub mod operation;
pub mod atomic;
pub mod wal;
pub mod replay;
pub mod log_manager;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{PageWalError, Result};
pub use config::Config;
pub use buffer::{BufferCursor, BufferPool, PooledBuffer};
pub use page::{PageHandle, PageHandleProvider, PageId, PageTable};
pub use record_id::RecordId;
pub use serializer::{BinarySerializer, SerializerId};
pub use bucket::{Bucket, BucketRead, BucketReader};
pub use operation::{OperationKind, OperationType, OperationUnitId, PageOperation};
pub use atomic::{AtomicOperation, CommitInfo};
pub use log_manager::LogManager;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of pagewal
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
