//! In-memory page table
//!
//! A `PageHandleProvider` that keeps every loaded page in a map and
//! allocates zeroed pages from a `BufferPool` on first access.

use std::collections::HashMap;

use tracing::trace;

use crate::buffer::BufferPool;
use crate::error::Result;

use super::{PageHandle, PageHandleProvider, PageId};

/// Map of live page handles backed by one buffer pool
#[derive(Debug)]
pub struct PageTable {
    pool: BufferPool,
    pages: HashMap<PageId, PageHandle>,
}

impl PageTable {
    pub fn new(pool: BufferPool) -> Self {
        Self {
            pool,
            pages: HashMap::new(),
        }
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Add a handle, returning the one it replaces
    pub fn insert(&mut self, handle: PageHandle) -> Option<PageHandle> {
        self.pages.insert(handle.page_id(), handle)
    }

    pub fn get(&self, page_id: PageId) -> Option<&PageHandle> {
        self.pages.get(&page_id)
    }

    pub fn get_mut(&mut self, page_id: PageId) -> Option<&mut PageHandle> {
        self.pages.get_mut(&page_id)
    }

    pub fn remove(&mut self, page_id: PageId) -> Option<PageHandle> {
        self.pages.remove(&page_id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Release every page back to the pool
    pub fn close_all(&mut self) {
        for (_, handle) in self.pages.drain() {
            handle.close(&self.pool);
        }
    }
}

impl PageHandleProvider for PageTable {
    fn load_page(&mut self, page_id: PageId) -> Result<&mut PageHandle> {
        let pool = &self.pool;
        Ok(self.pages.entry(page_id).or_insert_with(|| {
            trace!(%page_id, "allocating page for replay");
            PageHandle::with_page_id(page_id, pool.acquire(true))
        }))
    }
}
