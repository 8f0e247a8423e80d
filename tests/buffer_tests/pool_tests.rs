//! Tests for the buffer pool and buffer cursors
//!
//! These tests verify:
//! - Buffers are page-sized and zero-filled on request
//! - Released buffers are recycled instead of reallocated
//! - `clear` reports leaked buffers
//! - Cursors keep independent positions over shared bytes
//! - Page sizes too small for a bucket header are rejected
//! - Cross-buffer copies in opposite directions do not deadlock

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use pagewal::bucket::MIN_PAGE_SIZE;
use pagewal::{BufferPool, PageWalError};

const PAGE_SIZE: usize = 4096;

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_new_rejects_page_smaller_than_bucket_header() {
    for page_size in [0, 16, MIN_PAGE_SIZE - 1] {
        assert!(matches!(
            BufferPool::new(page_size),
            Err(PageWalError::Config(_))
        ));
    }

    let pool = BufferPool::new(MIN_PAGE_SIZE).unwrap();
    assert_eq!(pool.acquire(true).len(), MIN_PAGE_SIZE);
}

// =============================================================================
// Acquire / Release Tests
// =============================================================================

#[test]
fn test_acquire_returns_zeroed_page() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let buffer = pool.acquire(true);

    assert_eq!(buffer.len(), PAGE_SIZE);
    assert!(buffer.read().iter().all(|b| *b == 0));
    assert_eq!(pool.outstanding(), 1);
    assert_eq!(pool.allocated(), 1);
}

#[test]
fn test_release_recycles_buffer() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();

    let buffer = pool.acquire(true);
    pool.release(buffer);
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.idle(), 1);

    let _again = pool.acquire(false);
    assert_eq!(pool.allocated(), 1);
    assert_eq!(pool.idle(), 0);
}

#[test]
fn test_drop_returns_buffer_to_pool() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    {
        let _buffer = pool.acquire(true);
        assert_eq!(pool.outstanding(), 1);
    }
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.idle(), 1);
}

#[test]
fn test_zeroed_acquire_clears_recycled_bytes() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();

    let buffer = pool.acquire(true);
    buffer.write().fill(0xAB);
    pool.release(buffer);

    let recycled = pool.acquire(true);
    assert!(recycled.read().iter().all(|b| *b == 0));
}

#[test]
fn test_unzeroed_acquire_keeps_recycled_bytes() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();

    let buffer = pool.acquire(true);
    buffer.write()[0] = 0x7F;
    pool.release(buffer);

    let recycled = pool.acquire(false);
    assert_eq!(recycled.read()[0], 0x7F);
}

#[test]
fn test_pool_grows_lazily() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    assert_eq!(pool.allocated(), 0);

    let buffers: Vec<_> = (0..5).map(|_| pool.acquire(true)).collect();
    assert_eq!(pool.allocated(), 5);
    assert_eq!(pool.outstanding(), 5);

    drop(buffers);
    assert_eq!(pool.idle(), 5);
    assert_eq!(pool.allocated(), 5);
}

// =============================================================================
// Clear / Leak Detection Tests
// =============================================================================

#[test]
fn test_clear_drains_idle_buffers() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    drop(pool.acquire(true));
    drop(pool.acquire(true));

    let drained = pool.clear().unwrap();
    assert_eq!(drained, 1);
    assert_eq!(pool.idle(), 0);
    assert_eq!(pool.allocated(), 0);
}

#[test]
fn test_clear_with_outstanding_buffer_fails() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let buffer = pool.acquire(true);

    let err = pool.clear().unwrap_err();
    assert!(matches!(err, PageWalError::PoolLeak { outstanding: 1 }));

    pool.release(buffer);
    assert!(pool.clear().is_ok());
}

#[test]
fn test_cloned_pool_shares_state() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let clone = pool.clone();

    let buffer = clone.acquire(true);
    assert_eq!(pool.outstanding(), 1);
    pool.release(buffer);
    assert_eq!(clone.idle(), 1);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_acquire_release() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();

    thread::scope(|scope| {
        for t in 0..8u8 {
            let pool = pool.clone();
            scope.spawn(move || {
                for _ in 0..200 {
                    let buffer = pool.acquire(true);
                    buffer.write()[0] = t;
                    assert_eq!(buffer.read()[0], t);
                    pool.release(buffer);
                }
            });
        }
    });

    assert_eq!(pool.outstanding(), 0);
    assert!(pool.allocated() <= 8);
    assert!(pool.clear().is_ok());
}

// =============================================================================
// Cursor Tests
// =============================================================================

#[test]
fn test_cursors_have_independent_positions() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let buffer = pool.acquire(true);

    let mut writer = pagewal::BufferCursor::new(&buffer);
    let mut reader = pagewal::BufferCursor::new(&buffer);

    writer.put_bytes(&[1, 2, 3, 4]).unwrap();
    assert_eq!(writer.position(), 4);
    assert_eq!(reader.position(), 0);

    let mut out = [0u8; 4];
    reader.get_bytes(&mut out).unwrap();
    assert_eq!(out, [1, 2, 3, 4]);
}

#[test]
fn test_cursor_respects_limit() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let buffer = pool.acquire(true);
    let mut cursor = pagewal::BufferCursor::new(&buffer);

    cursor.set_limit(8).unwrap();
    assert_eq!(cursor.remaining(), 8);
    assert!(cursor.put_bytes(&[0u8; 9]).is_err());
    assert_eq!(cursor.position(), 0);

    cursor.put_bytes(&[0u8; 8]).unwrap();
    assert!(!cursor.has_remaining());
    assert!(cursor.set_position(9).is_err());
    assert!(cursor.set_limit(PAGE_SIZE + 1).is_err());
}

#[test]
fn test_put_from_copies_page_image() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let source = pool.acquire(true);
    let target = pool.acquire(true);

    source.write()[100..104].copy_from_slice(&[9, 8, 7, 6]);

    let mut from = pagewal::BufferCursor::new(&source);
    let mut to = pagewal::BufferCursor::new(&target);
    to.put_from(&mut from).unwrap();

    assert!(!from.has_remaining());
    assert_eq!(source.to_vec(), target.to_vec());
}

#[test]
fn test_put_from_same_buffer() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let buffer = pool.acquire(true);
    buffer.write()[0..4].copy_from_slice(&[1, 2, 3, 4]);

    let mut from = pagewal::BufferCursor::new(&buffer);
    from.set_limit(4).unwrap();
    let mut to = pagewal::BufferCursor::new(&buffer);
    to.set_position(16).unwrap();

    to.put_from(&mut from).unwrap();
    assert_eq!(&buffer.read()[16..20], &[1, 2, 3, 4]);
}

#[test]
fn test_put_from_opposite_directions_concurrently() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let first = pool.acquire(true);
    let second = pool.acquire(true);
    first.write().fill(1);
    second.write().fill(2);

    let copies = AtomicUsize::new(0);
    thread::scope(|s| {
        for (target, source) in [(&first, &second), (&second, &first)] {
            let copies = &copies;
            s.spawn(move || {
                for _ in 0..5_000 {
                    let mut to = pagewal::BufferCursor::new(target);
                    let mut from = pagewal::BufferCursor::new(source);
                    to.put_from(&mut from).unwrap();
                    copies.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    assert_eq!(copies.load(Ordering::Relaxed), 10_000);
    // Each copy moves a whole page, so both pages end up uniform.
    for buffer in [&first, &second] {
        let bytes = buffer.to_vec();
        assert!(bytes.iter().all(|byte| *byte == bytes[0]));
    }
}
