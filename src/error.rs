//! Error types for pagewal
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::operation::OperationUnitId;
use crate::page::PageId;

/// Result type alias using PageWalError
pub type Result<T> = std::result::Result<T, PageWalError>;

/// Unified error type for pagewal operations
#[derive(Debug, Error)]
pub enum PageWalError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Bucket Errors
    // -------------------------------------------------------------------------
    #[error("Page capacity exceeded: {required} bytes required, {available} available")]
    CapacityExceeded { required: usize, available: usize },

    #[error("Index {index} out of bounds for bucket of size {size}")]
    OutOfBounds { index: usize, size: usize },

    #[error("Invalid bucket entry: {0}")]
    InvalidEntry(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Decode error: {0}")]
    Decode(String),

    // -------------------------------------------------------------------------
    // Buffer Pool Errors
    // -------------------------------------------------------------------------
    #[error("Buffer pool leak: {outstanding} buffers still checked out")]
    PoolLeak { outstanding: usize },

    // -------------------------------------------------------------------------
    // Replay Errors
    // -------------------------------------------------------------------------
    #[error("Operation targets page {expected} but was applied to page {actual}")]
    PageMismatch { expected: PageId, actual: PageId },

    // -------------------------------------------------------------------------
    // Operation Unit Errors
    // -------------------------------------------------------------------------
    #[error("Operation unit {unit} is already committed")]
    UnitCommitted { unit: OperationUnitId },

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
