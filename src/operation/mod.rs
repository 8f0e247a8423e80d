//! Page Operation Module
//!
//! Self-describing records of single-page mutations that can be replayed
//! (redo) on the page state before the mutation and reversed (undo) on the
//! state after it.
//!
//! ## Responsibilities
//! - Closed set of operation kinds, one per bucket mutation
//! - Exact binary encoding (`to_stream` / `from_stream` / `serialized_size`)
//! - Redo and undo against a page handle
//!
//! ## Record Format (little-endian)
//! ```text
//! ┌──────────────┬────────────────┬──────────────┬──────────────────────┐
//! │ file_id (8)  │ page_index (8) │ unit id (16) │ kind-specific payload│
//! └──────────────┴────────────────┴──────────────┴──────────────────────┘
//! ```
//! The kind tag is not part of the record; containers such as the WAL write
//! it in front and hand it back to `from_stream`.
//!
//! Add-All payload:
//! ```text
//! ┌───────────────┬───────────────┬───────────────────┬───────────┬─────────────────────────┐
//! │ prev_size (4) │ encrypted (1) │ serializer id (4) │ count (4) │ (len (4) + bytes) * count│
//! └───────────────┴───────────────┴───────────────────┴───────────┴─────────────────────────┘
//! ```

mod apply;
mod codec;
mod stream;
mod unit;

use std::fmt;

pub use codec::RECORD_HEADER_SIZE;
pub use unit::OperationUnitId;

use crate::error::{PageWalError, Result};
use crate::page::PageId;
use crate::serializer::SerializerId;

/// One-byte discriminant of an operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationType {
    AddLeafEntry = 1,
    RemoveLeafEntry = 2,
    AddNonLeafEntry = 3,
    RemoveNonLeafEntry = 4,
    AddAll = 5,
    Shrink = 6,
    UpdateValue = 7,
    SetLeftSibling = 8,
    SetRightSibling = 9,
}

impl OperationType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Self::AddLeafEntry),
            2 => Ok(Self::RemoveLeafEntry),
            3 => Ok(Self::AddNonLeafEntry),
            4 => Ok(Self::RemoveNonLeafEntry),
            5 => Ok(Self::AddAll),
            6 => Ok(Self::Shrink),
            7 => Ok(Self::UpdateValue),
            8 => Ok(Self::SetLeftSibling),
            9 => Ok(Self::SetRightSibling),
            other => Err(PageWalError::Decode(format!(
                "unknown page operation tag {}",
                other
            ))),
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AddLeafEntry => "add-leaf-entry",
            Self::RemoveLeafEntry => "remove-leaf-entry",
            Self::AddNonLeafEntry => "add-non-leaf-entry",
            Self::RemoveNonLeafEntry => "remove-non-leaf-entry",
            Self::AddAll => "add-all",
            Self::Shrink => "shrink",
            Self::UpdateValue => "update-value",
            Self::SetLeftSibling => "set-left-sibling",
            Self::SetRightSibling => "set-right-sibling",
        };
        f.write_str(name)
    }
}

/// Kind-specific payload of a page operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    /// Leaf entry inserted at `index`
    AddLeafEntry {
        index: u32,
        key: Vec<u8>,
        value: Vec<u8>,
    },

    /// Leaf entry removed from `index`; carries its bytes for undo
    RemoveLeafEntry {
        index: u32,
        key: Vec<u8>,
        value: Vec<u8>,
    },

    AddNonLeafEntry {
        index: u32,
        key: Vec<u8>,
        left_child: i32,
        right_child: i32,
    },

    RemoveNonLeafEntry {
        index: u32,
        key: Vec<u8>,
        left_child: i32,
        right_child: i32,
    },

    /// Raw entries appended at the tail in one step
    AddAll {
        prev_size: u32,
        encrypted: bool,
        key_serializer: SerializerId,
        raw_entries: Vec<Vec<u8>>,
    },

    /// Bucket truncated to `new_size`; the discarded tail is kept for undo
    Shrink {
        new_size: u32,
        encrypted: bool,
        key_serializer: SerializerId,
        removed_entries: Vec<Vec<u8>>,
    },

    /// Leaf value overwritten in place
    UpdateValue {
        index: u32,
        key_size: u32,
        prev_value: Vec<u8>,
        value: Vec<u8>,
    },

    SetLeftSibling {
        prev_sibling: i64,
        sibling: i64,
    },

    SetRightSibling {
        prev_sibling: i64,
        sibling: i64,
    },
}

impl OperationKind {
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::AddLeafEntry { .. } => OperationType::AddLeafEntry,
            Self::RemoveLeafEntry { .. } => OperationType::RemoveLeafEntry,
            Self::AddNonLeafEntry { .. } => OperationType::AddNonLeafEntry,
            Self::RemoveNonLeafEntry { .. } => OperationType::RemoveNonLeafEntry,
            Self::AddAll { .. } => OperationType::AddAll,
            Self::Shrink { .. } => OperationType::Shrink,
            Self::UpdateValue { .. } => OperationType::UpdateValue,
            Self::SetLeftSibling { .. } => OperationType::SetLeftSibling,
            Self::SetRightSibling { .. } => OperationType::SetRightSibling,
        }
    }
}

/// A logged change to exactly one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOperation {
    page_id: PageId,
    unit_id: OperationUnitId,
    kind: OperationKind,
}

impl PageOperation {
    /// Record for `page_id` not yet bound to an operation unit
    pub fn new(page_id: PageId, kind: OperationKind) -> Self {
        Self {
            page_id,
            unit_id: OperationUnitId::NIL,
            kind,
        }
    }

    pub fn with_unit_id(page_id: PageId, unit_id: OperationUnitId, kind: OperationKind) -> Self {
        Self {
            page_id,
            unit_id,
            kind,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn file_id(&self) -> u64 {
        self.page_id.file_id
    }

    pub fn page_index(&self) -> u64 {
        self.page_id.page_index
    }

    pub fn unit_id(&self) -> OperationUnitId {
        self.unit_id
    }

    pub fn set_unit_id(&mut self, unit_id: OperationUnitId) {
        self.unit_id = unit_id;
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    pub fn operation_type(&self) -> OperationType {
        self.kind.operation_type()
    }
}
