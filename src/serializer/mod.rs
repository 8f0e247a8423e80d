//! Key/Value Serializer Module
//!
//! Binary codecs for bucket keys and values, identified by a stable id that
//! is persisted inside page operation records.
//!
//! ## Responsibilities
//! - `BinarySerializer` contract shared by every codec
//! - `SerializerId`: closed set of codec ids written to the log
//! - Entry sizing from raw bytes during recovery, without knowing the
//!   key type
//!
//! ## Encodings
//! Fixed-width integers are little-endian. Strings and binary blobs carry a
//! 4-byte length prefix. Links are the 10-byte native-order `RecordId`.

mod types;

use std::fmt;

pub use types::{
    BooleanSerializer, ByteSerializer, BytesSerializer, IntegerSerializer, LinkSerializer,
    LongSerializer, ShortSerializer, StringSerializer,
};

use crate::error::{PageWalError, Result};

/// Stable identifier of a key/value codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SerializerId {
    Byte = 1,
    Boolean = 2,
    Short = 3,
    Integer = 4,
    Long = 5,
    String = 6,
    Binary = 7,
    Link = 8,
}

impl SerializerId {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(id: u32) -> Result<Self> {
        match id {
            1 => Ok(Self::Byte),
            2 => Ok(Self::Boolean),
            3 => Ok(Self::Short),
            4 => Ok(Self::Integer),
            5 => Ok(Self::Long),
            6 => Ok(Self::String),
            7 => Ok(Self::Binary),
            8 => Ok(Self::Link),
            other => Err(PageWalError::Decode(format!("unknown serializer id {}", other))),
        }
    }

    /// Size of the object encoded at `offset`, read from the bytes alone
    pub fn object_size(self, bytes: &[u8], offset: usize) -> Result<usize> {
        match self {
            Self::Byte => ByteSerializer.object_size(bytes, offset),
            Self::Boolean => BooleanSerializer.object_size(bytes, offset),
            Self::Short => ShortSerializer.object_size(bytes, offset),
            Self::Integer => IntegerSerializer.object_size(bytes, offset),
            Self::Long => LongSerializer.object_size(bytes, offset),
            Self::String => StringSerializer.object_size(bytes, offset),
            Self::Binary => BytesSerializer.object_size(bytes, offset),
            Self::Link => LinkSerializer.object_size(bytes, offset),
        }
    }
}

impl fmt::Display for SerializerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Byte => "byte",
            Self::Boolean => "boolean",
            Self::Short => "short",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Link => "link",
        };
        f.write_str(name)
    }
}

/// A binary codec for one key or value type
pub trait BinarySerializer {
    type Value;

    /// Id persisted in log records
    const ID: SerializerId;

    /// Bytes `serialize` will produce for `value`
    fn serialized_size(&self, value: &Self::Value) -> usize;

    fn serialize(&self, value: &Self::Value) -> Vec<u8>;

    fn deserialize(&self, bytes: &[u8], offset: usize) -> Result<Self::Value>;

    /// Size of the encoded object starting at `offset`
    fn object_size(&self, bytes: &[u8], offset: usize) -> Result<usize>;
}

/// Borrow `len` bytes at `offset` or report a decode error
pub(crate) fn slice_at(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .map(|end| &bytes[offset..end])
        .ok_or_else(|| {
            PageWalError::Decode(format!(
                "need {} bytes at offset {}, buffer has {}",
                len,
                offset,
                bytes.len()
            ))
        })
}

/// Read a little-endian u32 length prefix at `offset`
pub(crate) fn read_len_prefix(bytes: &[u8], offset: usize) -> Result<usize> {
    let raw = slice_at(bytes, offset, 4)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize)
}
