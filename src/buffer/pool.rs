//! Buffer pool
//!
//! Lazily growing pool of page-sized byte regions.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::queue::SegQueue;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, trace};

use crate::bucket::MIN_PAGE_SIZE;
use crate::error::{PageWalError, Result};

/// State shared between a pool and every buffer it has handed out
struct PoolShared {
    page_size: usize,

    /// Idle buffers ready for reuse
    idle: SegQueue<Box<[u8]>>,

    /// Buffers currently checked out
    outstanding: AtomicUsize,

    /// Buffers ever allocated and not yet drained by `clear`
    allocated: AtomicUsize,
}

/// Pool of fixed-size page buffers
///
/// Cloning the pool is cheap and yields a handle to the same pool.
/// Buffers return to the pool they came from when released or dropped.
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    /// Create an empty pool handing out buffers of `page_size` bytes
    ///
    /// Every page must be able to hold a bucket header and its 32-bit
    /// offsets, so sizes outside `MIN_PAGE_SIZE..=u32::MAX` are rejected.
    pub fn new(page_size: usize) -> Result<Self> {
        if page_size < MIN_PAGE_SIZE || page_size > u32::MAX as usize {
            return Err(PageWalError::Config(format!(
                "page size {} outside the supported range {}..={}",
                page_size,
                MIN_PAGE_SIZE,
                u32::MAX
            )));
        }

        Ok(Self {
            shared: Arc::new(PoolShared {
                page_size,
                idle: SegQueue::new(),
                outstanding: AtomicUsize::new(0),
                allocated: AtomicUsize::new(0),
            }),
        })
    }

    /// Size in bytes of every buffer in this pool
    pub fn page_size(&self) -> usize {
        self.shared.page_size
    }

    /// Check out a buffer
    ///
    /// Reuses an idle buffer when one is available, otherwise allocates a
    /// new one. Newly allocated buffers are always zero-filled; recycled ones
    /// are only cleared when `zeroed` is set.
    pub fn acquire(&self, zeroed: bool) -> PooledBuffer {
        let data = match self.shared.idle.pop() {
            Some(mut data) => {
                if zeroed {
                    data.fill(0);
                }
                data
            }
            None => {
                self.shared.allocated.fetch_add(1, Ordering::Relaxed);
                vec![0u8; self.shared.page_size].into_boxed_slice()
            }
        };

        let outstanding = self.shared.outstanding.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(outstanding, zeroed, "buffer acquired");

        PooledBuffer {
            data: RwLock::new(data),
            pool: Arc::clone(&self.shared),
        }
    }

    /// Return a buffer to the pool
    ///
    /// Equivalent to dropping the buffer; spelled out for call sites that
    /// want the release to be visible.
    pub fn release(&self, buffer: PooledBuffer) {
        if !Arc::ptr_eq(&self.shared, &buffer.pool) {
            debug!("buffer released through a different pool; returning to its owner");
        }
        drop(buffer);
    }

    /// Number of buffers currently checked out
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    /// Number of idle buffers waiting for reuse
    pub fn idle(&self) -> usize {
        self.shared.idle.len()
    }

    /// Number of buffers allocated by this pool since the last clear
    pub fn allocated(&self) -> usize {
        self.shared.allocated.load(Ordering::Relaxed)
    }

    /// Drain every idle buffer
    ///
    /// Fails with `PoolLeak` if any buffer is still checked out. On failure
    /// the idle buffers are left in place.
    pub fn clear(&self) -> Result<usize> {
        let outstanding = self.outstanding();
        if outstanding > 0 {
            error!(outstanding, "buffer pool cleared with buffers still checked out");
            return Err(PageWalError::PoolLeak { outstanding });
        }

        let mut drained = 0;
        while self.shared.idle.pop().is_some() {
            drained += 1;
        }
        self.shared.allocated.fetch_sub(drained, Ordering::Relaxed);

        debug!(drained, "buffer pool cleared");
        Ok(drained)
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("page_size", &self.page_size())
            .field("outstanding", &self.outstanding())
            .field("idle", &self.idle())
            .finish()
    }
}

/// A page-sized byte region checked out from a `BufferPool`
///
/// The bytes sit behind a read/write lock so any number of cursors can
/// observe them while one owner mutates through `&mut`.
pub struct PooledBuffer {
    data: RwLock<Box<[u8]>>,
    pool: Arc<PoolShared>,
}

impl PooledBuffer {
    /// Buffer length in bytes (always the pool's page size)
    pub fn len(&self) -> usize {
        self.pool.page_size
    }

    /// Never true: pools refuse page sizes below `MIN_PAGE_SIZE`
    pub fn is_empty(&self) -> bool {
        self.pool.page_size == 0
    }

    /// Shared access to the bytes
    pub fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.data.read()
    }

    /// Exclusive access to the bytes through a shared reference
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.data.write()
    }

    /// Exclusive access without locking; requires unique ownership
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data.get_mut()[..]
    }

    /// Copy of the current bytes
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.read().to_vec()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let data = std::mem::take(self.data.get_mut());
        if data.len() == self.pool.page_size {
            self.pool.idle.push(data);
        }
        let outstanding = self.pool.outstanding.fetch_sub(1, Ordering::AcqRel) - 1;
        trace!(outstanding, "buffer released");
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer").field("len", &self.len()).finish()
    }
}
