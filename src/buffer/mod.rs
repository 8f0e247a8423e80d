//! Pooled Page Buffer Module
//!
//! Fixed-size page buffers recycled through an explicit pool instance.
//!
//! ## Responsibilities
//! - Hand out buffers of exactly `page_size` bytes, zero-filled on request
//! - Take buffers back on release or drop and reuse them
//! - Detect leaked buffers when the pool is cleared
//! - Provide independent cursors (position/limit) over one buffer's bytes
//!
//! ## Ownership
//! ```text
//!   BufferPool ──acquire──▶ PooledBuffer ──owned by──▶ PageHandle
//!        ▲                       │
//!        └──────release/drop─────┘
//!                                │ borrowed by
//!                                ▼
//!                     BufferCursor<'_> (many, short-lived)
//! ```

mod cursor;
mod pool;

pub use cursor::BufferCursor;
pub use pool::{BufferPool, PooledBuffer};
