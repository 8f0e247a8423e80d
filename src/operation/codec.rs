//! Page operation encoding

use bytes::BufMut;

use crate::error::{PageWalError, Result};
use crate::page::PageId;

use super::stream::{bytes_list_size, bytes_size, put_bytes, put_bytes_list, StreamReader};
use super::{OperationKind, OperationType, OperationUnitId, PageOperation};

/// file_id (8) + page_index (8) + unit id (16)
pub const RECORD_HEADER_SIZE: usize = 8 + 8 + OperationUnitId::SIZE;

impl PageOperation {
    /// Exact number of bytes `to_stream` writes
    pub fn serialized_size(&self) -> usize {
        RECORD_HEADER_SIZE + payload_size(&self.kind)
    }

    /// Write the record at `offset`, returning the offset just past it
    pub fn to_stream(&self, stream: &mut [u8], offset: usize) -> Result<usize> {
        let size = self.serialized_size();
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= stream.len())
            .ok_or_else(|| {
                PageWalError::WalWrite(format!(
                    "record of {} bytes does not fit at offset {} of a {} byte stream",
                    size,
                    offset,
                    stream.len()
                ))
            })?;

        let mut out = &mut stream[offset..end];
        out.put_u64_le(self.page_id.file_id);
        out.put_u64_le(self.page_id.page_index);
        out.put_slice(self.unit_id.as_bytes());
        write_payload(&mut out, &self.kind);

        Ok(end)
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        out.put_u64_le(self.page_id.file_id);
        out.put_u64_le(self.page_id.page_index);
        out.put_slice(self.unit_id.as_bytes());
        write_payload(&mut out, &self.kind);
        out
    }

    /// Read a record of kind `operation_type` at `offset`
    ///
    /// Returns the record and the offset just past it.
    pub fn from_stream(
        operation_type: OperationType,
        stream: &[u8],
        offset: usize,
    ) -> Result<(Self, usize)> {
        let mut reader = StreamReader::new(stream, offset)?;

        let file_id = reader.u64("file id")?;
        let page_index = reader.u64("page index")?;
        let unit_id = reader.unit_id()?;
        let kind = read_payload(operation_type, &mut reader)?;

        let operation = PageOperation::with_unit_id(PageId::new(file_id, page_index), unit_id, kind);
        Ok((operation, offset + reader.consumed()))
    }
}

fn payload_size(kind: &OperationKind) -> usize {
    match kind {
        OperationKind::AddLeafEntry { key, value, .. }
        | OperationKind::RemoveLeafEntry { key, value, .. } => {
            4 + bytes_size(key) + bytes_size(value)
        }
        OperationKind::AddNonLeafEntry { key, .. }
        | OperationKind::RemoveNonLeafEntry { key, .. } => 4 + 4 + 4 + bytes_size(key),
        OperationKind::AddAll { raw_entries, .. } => 4 + 1 + 4 + bytes_list_size(raw_entries),
        OperationKind::Shrink {
            removed_entries, ..
        } => 4 + 1 + 4 + bytes_list_size(removed_entries),
        OperationKind::UpdateValue {
            prev_value, value, ..
        } => 4 + 4 + bytes_size(prev_value) + bytes_size(value),
        OperationKind::SetLeftSibling { .. } | OperationKind::SetRightSibling { .. } => 8 + 8,
    }
}

fn write_payload(out: &mut impl BufMut, kind: &OperationKind) {
    match kind {
        OperationKind::AddLeafEntry { index, key, value }
        | OperationKind::RemoveLeafEntry { index, key, value } => {
            out.put_u32_le(*index);
            put_bytes(out, key);
            put_bytes(out, value);
        }
        OperationKind::AddNonLeafEntry {
            index,
            key,
            left_child,
            right_child,
        }
        | OperationKind::RemoveNonLeafEntry {
            index,
            key,
            left_child,
            right_child,
        } => {
            out.put_u32_le(*index);
            out.put_i32_le(*left_child);
            out.put_i32_le(*right_child);
            put_bytes(out, key);
        }
        OperationKind::AddAll {
            prev_size: size,
            encrypted,
            key_serializer,
            raw_entries: entries,
        }
        | OperationKind::Shrink {
            new_size: size,
            encrypted,
            key_serializer,
            removed_entries: entries,
        } => {
            out.put_u32_le(*size);
            out.put_u8(u8::from(*encrypted));
            out.put_u32_le(key_serializer.as_u32());
            put_bytes_list(out, entries);
        }
        OperationKind::UpdateValue {
            index,
            key_size,
            prev_value,
            value,
        } => {
            out.put_u32_le(*index);
            out.put_u32_le(*key_size);
            put_bytes(out, prev_value);
            put_bytes(out, value);
        }
        OperationKind::SetLeftSibling {
            prev_sibling,
            sibling,
        }
        | OperationKind::SetRightSibling {
            prev_sibling,
            sibling,
        } => {
            out.put_i64_le(*prev_sibling);
            out.put_i64_le(*sibling);
        }
    }
}

fn read_payload(operation_type: OperationType, reader: &mut StreamReader<'_>) -> Result<OperationKind> {
    let kind = match operation_type {
        OperationType::AddLeafEntry | OperationType::RemoveLeafEntry => {
            let index = reader.u32("entry index")?;
            let key = reader.bytes("key")?;
            let value = reader.bytes("value")?;
            if operation_type == OperationType::AddLeafEntry {
                OperationKind::AddLeafEntry { index, key, value }
            } else {
                OperationKind::RemoveLeafEntry { index, key, value }
            }
        }
        OperationType::AddNonLeafEntry | OperationType::RemoveNonLeafEntry => {
            let index = reader.u32("entry index")?;
            let left_child = reader.i32("left child")?;
            let right_child = reader.i32("right child")?;
            let key = reader.bytes("key")?;
            if operation_type == OperationType::AddNonLeafEntry {
                OperationKind::AddNonLeafEntry {
                    index,
                    key,
                    left_child,
                    right_child,
                }
            } else {
                OperationKind::RemoveNonLeafEntry {
                    index,
                    key,
                    left_child,
                    right_child,
                }
            }
        }
        OperationType::AddAll => OperationKind::AddAll {
            prev_size: reader.u32("previous size")?,
            encrypted: reader.bool("encrypted")?,
            key_serializer: reader.serializer_id()?,
            raw_entries: reader.bytes_list("raw entries")?,
        },
        OperationType::Shrink => OperationKind::Shrink {
            new_size: reader.u32("new size")?,
            encrypted: reader.bool("encrypted")?,
            key_serializer: reader.serializer_id()?,
            removed_entries: reader.bytes_list("removed entries")?,
        },
        OperationType::UpdateValue => OperationKind::UpdateValue {
            index: reader.u32("entry index")?,
            key_size: reader.u32("key size")?,
            prev_value: reader.bytes("previous value")?,
            value: reader.bytes("value")?,
        },
        OperationType::SetLeftSibling => OperationKind::SetLeftSibling {
            prev_sibling: reader.i64("previous sibling")?,
            sibling: reader.i64("sibling")?,
        },
        OperationType::SetRightSibling => OperationKind::SetRightSibling {
            prev_sibling: reader.i64("previous sibling")?,
            sibling: reader.i64("sibling")?,
        },
    };
    Ok(kind)
}
