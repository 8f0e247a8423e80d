//! Record identity
//!
//! The `(cluster_id, cluster_position)` pair stored as a leaf value.

use std::fmt;

use crate::error::{PageWalError, Result};

/// Reference to a record: 2-byte cluster id plus 8-byte position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub cluster_id: i16,
    pub cluster_position: i64,
}

impl RecordId {
    /// Encoded size in bytes
    pub const SIZE: usize = 10;

    pub fn new(cluster_id: i16, cluster_position: i64) -> Self {
        Self {
            cluster_id,
            cluster_position,
        }
    }

    /// Encode as 10 bytes in native byte order
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.cluster_id.to_ne_bytes());
        bytes[2..10].copy_from_slice(&self.cluster_position.to_ne_bytes());
        bytes
    }

    /// Decode from the first 10 bytes at `offset`
    pub fn from_bytes(bytes: &[u8], offset: usize) -> Result<Self> {
        let end = offset
            .checked_add(Self::SIZE)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| {
                PageWalError::Decode(format!(
                    "record id needs {} bytes at offset {}, buffer has {}",
                    Self::SIZE,
                    offset,
                    bytes.len()
                ))
            })?;
        let raw = &bytes[offset..end];

        let mut cluster_id = [0u8; 2];
        cluster_id.copy_from_slice(&raw[0..2]);
        let mut cluster_position = [0u8; 8];
        cluster_position.copy_from_slice(&raw[2..10]);

        Ok(Self {
            cluster_id: i16::from_ne_bytes(cluster_id),
            cluster_position: i64::from_ne_bytes(cluster_position),
        })
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster_id, self.cluster_position)
    }
}
