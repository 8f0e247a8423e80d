//! Page handle
//!
//! In-memory binding of a page buffer, its identity and its pending
//! operation log.

use crate::buffer::{BufferCursor, BufferPool, PooledBuffer};
use crate::operation::PageOperation;

use super::PageId;

/// A loaded page
///
/// ## Access discipline
/// - Mutations go through `&mut PageHandle` (one mutator at a time)
/// - Readers share `&PageHandle` and take their own cursors
/// - Dropping the handle returns the buffer to its pool
#[derive(Debug)]
pub struct PageHandle {
    page_id: PageId,
    buffer: PooledBuffer,
    operations: Vec<PageOperation>,
}

impl PageHandle {
    /// Bind `buffer` to the page `(file_id, page_index)`
    pub fn new(file_id: u64, page_index: u64, buffer: PooledBuffer) -> Self {
        Self::with_page_id(PageId::new(file_id, page_index), buffer)
    }

    pub fn with_page_id(page_id: PageId, buffer: PooledBuffer) -> Self {
        Self {
            page_id,
            buffer,
            operations: Vec::new(),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn file_id(&self) -> u64 {
        self.page_id.file_id
    }

    pub fn page_index(&self) -> u64 {
        self.page_id.page_index
    }

    /// Page size in bytes
    pub fn page_size(&self) -> usize {
        self.buffer.len()
    }

    /// Independent cursor over the page bytes
    pub fn buffer_duplicate(&self) -> BufferCursor<'_> {
        BufferCursor::new(&self.buffer)
    }

    /// Pending operations in the order they were applied
    pub fn page_operations(&self) -> &[PageOperation] {
        &self.operations
    }

    /// Forget pending operations; the page bytes are left untouched
    pub fn clear_page_operations(&mut self) {
        self.operations.clear();
    }

    /// Drain pending operations for logging
    pub fn take_page_operations(&mut self) -> Vec<PageOperation> {
        std::mem::take(&mut self.operations)
    }

    /// Copy of the whole page image
    pub fn snapshot(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Release the buffer back to `pool`
    pub fn close(self, pool: &BufferPool) {
        pool.release(self.buffer);
    }

    pub(crate) fn page(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8]>> {
        self.buffer.read()
    }

    pub(crate) fn page_mut(&mut self) -> &mut [u8] {
        self.buffer.as_mut_slice()
    }

    pub(crate) fn push_operation(&mut self, operation: PageOperation) {
        self.operations.push(operation);
    }
}
