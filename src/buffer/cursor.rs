//! Buffer cursor
//!
//! A position/limit window over a `PooledBuffer`. Cursors borrow the buffer
//! and therefore cannot outlive the handle that owns it.

use crate::error::{PageWalError, Result};

use super::PooledBuffer;

/// Independent read/write cursor over a pooled buffer
///
/// Every cursor keeps its own position and limit; all cursors over the same
/// buffer observe the same bytes.
#[derive(Debug)]
pub struct BufferCursor<'a> {
    buffer: &'a PooledBuffer,
    position: usize,
    limit: usize,
}

impl<'a> BufferCursor<'a> {
    /// Cursor spanning the whole buffer, positioned at 0
    pub fn new(buffer: &'a PooledBuffer) -> Self {
        Self {
            buffer,
            position: 0,
            limit: buffer.len(),
        }
    }

    /// Total buffer length
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the position; must not pass the limit
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.limit {
            return Err(PageWalError::OutOfBounds {
                index: position,
                size: self.limit,
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Move the limit; the position is pulled back if it ends up past it
    pub fn set_limit(&mut self, limit: usize) -> Result<()> {
        if limit > self.capacity() {
            return Err(PageWalError::OutOfBounds {
                index: limit,
                size: self.capacity(),
            });
        }
        self.limit = limit;
        self.position = self.position.min(limit);
        Ok(())
    }

    /// Bytes between position and limit
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    /// Rewind to position 0 keeping the limit
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Fill `dst` from the current position and advance
    pub fn get_bytes(&mut self, dst: &mut [u8]) -> Result<()> {
        self.check_remaining(dst.len())?;
        let data = self.buffer.read();
        dst.copy_from_slice(&data[self.position..self.position + dst.len()]);
        self.position += dst.len();
        Ok(())
    }

    /// Write `src` at the current position and advance
    pub fn put_bytes(&mut self, src: &[u8]) -> Result<()> {
        self.check_remaining(src.len())?;
        let mut data = self.buffer.write();
        data[self.position..self.position + src.len()].copy_from_slice(src);
        self.position += src.len();
        Ok(())
    }

    /// Copy everything remaining in `src` into this cursor, advancing both
    ///
    /// Used to restore a page image from one buffer into another. At most
    /// one buffer lock is held at a time, so two threads copying between
    /// the same pair of buffers in opposite directions cannot deadlock.
    pub fn put_from(&mut self, src: &mut BufferCursor<'_>) -> Result<()> {
        let len = src.remaining();
        self.check_remaining(len)?;

        if std::ptr::eq(self.buffer, src.buffer) {
            let mut data = self.buffer.write();
            data.copy_within(src.position..src.position + len, self.position);
        } else {
            let window = src.to_vec();
            let mut to = self.buffer.write();
            to[self.position..self.position + len].copy_from_slice(&window);
        }

        self.position += len;
        src.position += len;
        Ok(())
    }

    /// Copy of the bytes between position and limit; does not advance
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.read()[self.position..self.limit].to_vec()
    }

    fn check_remaining(&self, needed: usize) -> Result<()> {
        if needed > self.remaining() {
            return Err(PageWalError::OutOfBounds {
                index: self.position + needed,
                size: self.limit,
            });
        }
        Ok(())
    }
}
