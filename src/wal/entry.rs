//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and the records
//! they carry.

use bytes::BufMut;

use crate::error::{PageWalError, Result};
use crate::operation::{OperationType, OperationUnitId, PageOperation};

/// LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

const TAG_UNIT_START: u8 = 1;
const TAG_PAGE_OPERATION: u8 = 2;
const TAG_UNIT_END: u8 = 3;

/// What a WAL entry records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// An operation unit starts writing its records
    UnitStart { unit_id: OperationUnitId },

    /// One page mutation belonging to an operation unit
    PageOperation(PageOperation),

    /// An operation unit finished; `rolled_back` marks an aborted unit
    UnitEnd {
        unit_id: OperationUnitId,
        rolled_back: bool,
    },
}

impl LogRecord {
    /// Unit the record belongs to
    pub fn unit_id(&self) -> OperationUnitId {
        match self {
            LogRecord::UnitStart { unit_id } | LogRecord::UnitEnd { unit_id, .. } => *unit_id,
            LogRecord::PageOperation(operation) => operation.unit_id(),
        }
    }

    /// Number of bytes `encode` produces
    pub fn encoded_size(&self) -> usize {
        match self {
            LogRecord::UnitStart { .. } => 1 + OperationUnitId::SIZE,
            LogRecord::PageOperation(operation) => 1 + 1 + operation.serialized_size(),
            LogRecord::UnitEnd { .. } => 1 + OperationUnitId::SIZE + 1,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_size());
        match self {
            LogRecord::UnitStart { unit_id } => {
                out.put_u8(TAG_UNIT_START);
                out.put_slice(unit_id.as_bytes());
            }
            LogRecord::PageOperation(operation) => {
                out.put_u8(TAG_PAGE_OPERATION);
                out.put_u8(operation.operation_type().as_u8());
                out.extend_from_slice(&operation.to_bytes());
            }
            LogRecord::UnitEnd {
                unit_id,
                rolled_back,
            } => {
                out.put_u8(TAG_UNIT_END);
                out.put_slice(unit_id.as_bytes());
                out.put_u8(u8::from(*rolled_back));
            }
        }
        out
    }

    /// Decode a record that must span all of `data`
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (&tag, rest) = data
            .split_first()
            .ok_or_else(|| PageWalError::Decode("empty log record".to_string()))?;

        let (record, consumed) = match tag {
            TAG_UNIT_START => (
                LogRecord::UnitStart {
                    unit_id: read_unit_id(rest)?,
                },
                OperationUnitId::SIZE,
            ),
            TAG_PAGE_OPERATION => {
                let (&op_tag, stream) = rest.split_first().ok_or_else(|| {
                    PageWalError::Decode("page operation record without kind tag".to_string())
                })?;
                let operation_type = OperationType::from_u8(op_tag)?;
                let (operation, end) = PageOperation::from_stream(operation_type, stream, 0)?;
                (LogRecord::PageOperation(operation), 1 + end)
            }
            TAG_UNIT_END => {
                let unit_id = read_unit_id(rest)?;
                let rolled_back = match rest.get(OperationUnitId::SIZE) {
                    Some(0) => false,
                    Some(1) => true,
                    Some(other) => {
                        return Err(PageWalError::Decode(format!(
                            "rolled_back flag must be 0 or 1, got {}",
                            other
                        )))
                    }
                    None => {
                        return Err(PageWalError::Decode(
                            "unit end record missing rolled_back flag".to_string(),
                        ))
                    }
                };
                (
                    LogRecord::UnitEnd {
                        unit_id,
                        rolled_back,
                    },
                    OperationUnitId::SIZE + 1,
                )
            }
            other => {
                return Err(PageWalError::Decode(format!(
                    "unknown log record tag {}",
                    other
                )))
            }
        };

        if consumed != rest.len() {
            return Err(PageWalError::Decode(format!(
                "log record has {} trailing bytes",
                rest.len().saturating_sub(consumed)
            )));
        }
        Ok(record)
    }
}

fn read_unit_id(bytes: &[u8]) -> Result<OperationUnitId> {
    let raw = bytes
        .get(..OperationUnitId::SIZE)
        .ok_or_else(|| PageWalError::Decode("truncated operation unit id".to_string()))?;
    let mut id = [0u8; OperationUnitId::SIZE];
    id.copy_from_slice(raw);
    Ok(OperationUnitId::from_bytes(id))
}

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The logged record
    pub record: LogRecord,
}

impl WalEntry {
    pub fn new(lsn: u64, record: LogRecord) -> Self {
        Self { lsn, record }
    }

    /// Total on-disk size: header plus encoded record
    pub fn serialized_size(&self) -> usize {
        HEADER_SIZE + self.record.encoded_size()
    }

    /// Frame the entry as `LSN | CRC | Len | Data`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = self.record.encode();
        let len = u32::try_from(data.len()).map_err(|_| {
            PageWalError::WalWrite(format!("log record of {} bytes is too large", data.len()))
        })?;
        let crc = Self::checksum(self.lsn, len, &data);

        let mut out = Vec::with_capacity(HEADER_SIZE + data.len());
        out.put_u64_le(self.lsn);
        out.put_u32_le(crc);
        out.put_u32_le(len);
        out.extend_from_slice(&data);
        Ok(out)
    }

    /// Parse one framed entry from the start of `bytes`
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (lsn, crc, len) = Self::parse_header(bytes)?;
        let data = bytes.get(HEADER_SIZE..HEADER_SIZE + len as usize).ok_or_else(|| {
            PageWalError::WalCorruption(format!(
                "entry data truncated: expected {} bytes, got {}",
                len,
                bytes.len() - HEADER_SIZE
            ))
        })?;

        let computed = Self::checksum(lsn, len, data);
        if computed != crc {
            return Err(PageWalError::WalCorruption(format!(
                "CRC mismatch at LSN {}: stored {:#010x}, computed {:#010x}",
                lsn, crc, computed
            )));
        }

        Ok(Self {
            lsn,
            record: LogRecord::decode(data)?,
        })
    }

    /// Split a header into `(lsn, crc, len)`
    pub(crate) fn parse_header(bytes: &[u8]) -> Result<(u64, u32, u32)> {
        let header = bytes.get(..HEADER_SIZE).ok_or_else(|| {
            PageWalError::WalCorruption(format!(
                "entry header truncated: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            ))
        })?;

        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&header[0..8]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&header[8..12]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&header[12..16]);

        Ok((
            u64::from_le_bytes(lsn),
            u32::from_le_bytes(crc),
            u32::from_le_bytes(len),
        ))
    }

    /// CRC32 over LSN, length and data
    pub fn compute_crc(&self) -> u32 {
        let data = self.record.encode();
        Self::checksum(self.lsn, data.len() as u32, &data)
    }

    fn checksum(lsn: u64, len: u32, data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(&len.to_le_bytes());
        hasher.update(data);
        hasher.finalize()
    }
}
