//! Page Handle Module
//!
//! Binds a pooled buffer to a stable page identity and records the pending
//! operations applied to it.
//!
//! ## Responsibilities
//! - Page identity (`file_id`, `page_index`)
//! - Duplicate cursors over the page bytes for readers
//! - Ordered list of page operations not yet written to the log
//! - Resolution of page ids to live handles during recovery

mod handle;
mod table;

use std::fmt;

pub use handle::PageHandle;
pub use table::PageTable;

use crate::error::Result;

/// Identity of a fixed-size page within one storage instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub file_id: u64,
    pub page_index: u64,
}

impl PageId {
    pub fn new(file_id: u64, page_index: u64) -> Self {
        Self {
            file_id,
            page_index,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_id, self.page_index)
    }
}

/// Resolves a page id to a live handle, loading the page if needed
///
/// Recovery code is written against this trait so it never needs to know
/// where pages come from.
pub trait PageHandleProvider {
    fn load_page(&mut self, page_id: PageId) -> Result<&mut PageHandle>;
}
