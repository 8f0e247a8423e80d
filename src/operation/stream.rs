//! Bounds-checked record stream access
//!
//! Thin wrappers over `bytes::Buf`/`BufMut` that turn short input into a
//! `Decode` error instead of a panic.

use bytes::{Buf, BufMut};

use crate::error::{PageWalError, Result};
use crate::serializer::SerializerId;

use super::OperationUnitId;

/// Cursor reading a record from a byte slice
pub(crate) struct StreamReader<'a> {
    buf: &'a [u8],
    start_len: usize,
}

impl<'a> StreamReader<'a> {
    pub(crate) fn new(stream: &'a [u8], offset: usize) -> Result<Self> {
        if offset > stream.len() {
            return Err(PageWalError::Decode(format!(
                "record offset {} beyond stream of {} bytes",
                offset,
                stream.len()
            )));
        }
        let buf = &stream[offset..];
        Ok(Self {
            buf,
            start_len: buf.len(),
        })
    }

    /// Bytes consumed so far
    pub(crate) fn consumed(&self) -> usize {
        self.start_len - self.buf.remaining()
    }

    fn ensure(&self, needed: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(PageWalError::Decode(format!(
                "truncated record: {} needs {} bytes, {} left",
                what,
                needed,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self, what: &str) -> Result<u8> {
        self.ensure(1, what)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn bool(&mut self, what: &str) -> Result<bool> {
        match self.u8(what)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(PageWalError::Decode(format!(
                "{} flag must be 0 or 1, got {}",
                what, other
            ))),
        }
    }

    pub(crate) fn u32(&mut self, what: &str) -> Result<u32> {
        self.ensure(4, what)?;
        Ok(self.buf.get_u32_le())
    }

    pub(crate) fn i32(&mut self, what: &str) -> Result<i32> {
        self.ensure(4, what)?;
        Ok(self.buf.get_i32_le())
    }

    pub(crate) fn u64(&mut self, what: &str) -> Result<u64> {
        self.ensure(8, what)?;
        Ok(self.buf.get_u64_le())
    }

    pub(crate) fn i64(&mut self, what: &str) -> Result<i64> {
        self.ensure(8, what)?;
        Ok(self.buf.get_i64_le())
    }

    pub(crate) fn unit_id(&mut self) -> Result<OperationUnitId> {
        self.ensure(OperationUnitId::SIZE, "operation unit id")?;
        let mut raw = [0u8; OperationUnitId::SIZE];
        self.buf.copy_to_slice(&mut raw);
        Ok(OperationUnitId::from_bytes(raw))
    }

    pub(crate) fn serializer_id(&mut self) -> Result<SerializerId> {
        SerializerId::from_u32(self.u32("serializer id")?)
    }

    /// Length-prefixed byte string
    pub(crate) fn bytes(&mut self, what: &str) -> Result<Vec<u8>> {
        let len = self.u32(what)? as usize;
        self.ensure(len, what)?;
        let mut out = vec![0u8; len];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Count-prefixed list of length-prefixed byte strings
    pub(crate) fn bytes_list(&mut self, what: &str) -> Result<Vec<Vec<u8>>> {
        let count = self.u32(what)? as usize;
        // Each entry needs at least its 4-byte length.
        self.ensure(count.saturating_mul(4), what)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.bytes(what)?);
        }
        Ok(out)
    }
}

/// Encoded size of a length-prefixed byte string
pub(crate) fn bytes_size(bytes: &[u8]) -> usize {
    4 + bytes.len()
}

/// Encoded size of a count-prefixed list
pub(crate) fn bytes_list_size(list: &[Vec<u8>]) -> usize {
    4 + list.iter().map(|entry| bytes_size(entry)).sum::<usize>()
}

pub(crate) fn put_bytes(out: &mut impl BufMut, bytes: &[u8]) {
    out.put_u32_le(bytes.len() as u32);
    out.put_slice(bytes);
}

pub(crate) fn put_bytes_list(out: &mut impl BufMut, list: &[Vec<u8>]) {
    out.put_u32_le(list.len() as u32);
    for entry in list {
        put_bytes(out, entry);
    }
}
