//! Bucket Codec Module
//!
//! Interprets one page as a B-tree bucket (leaf or non-leaf node) and
//! mutates it in place.
//!
//! ## Responsibilities
//! - Header, offset directory and entry data layout (see `layout`)
//! - Positional insertion, removal, bulk append and truncation of entries
//! - Raw entry extraction for later replay
//! - One page operation record per mutation, pushed onto the page handle
//!
//! ## Entry Formats
//! ```text
//! leaf:      ┌───────────┬─────────────┐
//!            │ key bytes │ value bytes │
//!            └───────────┴─────────────┘
//! non-leaf:  ┌──────────┬───────────┬───────────┐
//!            │ left (4) │ right (4) │ key bytes │
//!            └──────────┴───────────┴───────────┘
//! ```
//! Encrypted keys are stored as a 4-byte length followed by the ciphertext.
//! Leaf values are encoded by the bucket's value codec, a 10-byte `RecordId`
//! (`SerializerId::Link`) unless another one is chosen.

pub(crate) mod layout;

use tracing::debug;

use crate::error::{PageWalError, Result};
use crate::operation::{OperationKind, PageOperation};
use crate::page::PageHandle;
use crate::serializer::{BinarySerializer, SerializerId};

pub use layout::{NO_SIBLING, POSITIONS_ARRAY_OFFSET, SLOT_SIZE};

/// Smallest page that can hold the header and a few entries
pub const MIN_PAGE_SIZE: usize = 64;

// =============================================================================
// Read Access
// =============================================================================

/// Read operations shared by `Bucket` and `BucketReader`
pub trait BucketRead {
    /// Run `f` over the page bytes
    fn with_page<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R;

    /// Codec of the values stored in leaf entries
    fn value_serializer(&self) -> SerializerId;

    /// Number of entries
    fn size(&self) -> usize {
        self.with_page(layout::size)
    }

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn is_leaf(&self) -> bool {
        self.with_page(layout::is_leaf)
    }

    /// Bytes still available for entries and their slots
    fn free_space(&self) -> usize {
        self.with_page(layout::free_space)
    }

    fn left_sibling(&self) -> i64 {
        self.with_page(layout::left_sibling)
    }

    fn right_sibling(&self) -> i64 {
        self.with_page(layout::right_sibling)
    }

    /// Exact serialized bytes of entry `index`
    fn get_raw_entry(
        &self,
        index: usize,
        encrypted: bool,
        key_serializer: SerializerId,
    ) -> Result<Vec<u8>> {
        let value_serializer = self.value_serializer();
        self.with_page(|page| {
            layout::raw_entry(page, index, encrypted, key_serializer, value_serializer)
        })
    }

    /// Key bytes of entry `index` as stored
    fn get_raw_key(
        &self,
        index: usize,
        encrypted: bool,
        key_serializer: SerializerId,
    ) -> Result<Vec<u8>> {
        self.with_page(|page| layout::raw_key(page, index, encrypted, key_serializer))
    }

    /// Decoded key of entry `index`; only for unencrypted keys
    fn get_key<S: BinarySerializer>(&self, index: usize, serializer: &S) -> Result<S::Value> {
        let raw = self.get_raw_key(index, false, S::ID)?;
        serializer.deserialize(&raw, 0)
    }

    /// Decoded value of leaf entry `index`
    ///
    /// `serializer` must be the bucket's value codec.
    fn get_value<S: BinarySerializer>(
        &self,
        index: usize,
        encrypted: bool,
        key_serializer: SerializerId,
        serializer: &S,
    ) -> Result<S::Value> {
        if S::ID != self.value_serializer() {
            return Err(PageWalError::InvalidEntry(format!(
                "values are encoded as {}, not {}",
                self.value_serializer(),
                S::ID
            )));
        }
        self.with_page(|page| {
            if !layout::is_leaf(page) {
                return Err(PageWalError::InvalidEntry(
                    "non-leaf buckets carry no values".to_string(),
                ));
            }
            let position = layout::entry_position(page, index)?;
            let key_size = layout::key_size(page, position, encrypted, key_serializer)?;
            serializer.deserialize(page, position + key_size)
        })
    }

    /// Left child pointer of non-leaf entry `index`
    fn get_left(&self, index: usize) -> Result<i32> {
        self.with_page(|page| layout::children(page, index).map(|(left, _)| left))
    }

    /// Right child pointer of non-leaf entry `index`
    fn get_right(&self, index: usize) -> Result<i32> {
        self.with_page(|page| layout::children(page, index).map(|(_, right)| right))
    }
}

/// Read-only bucket view for concurrent readers
pub struct BucketReader<'a> {
    handle: &'a PageHandle,
    value_serializer: SerializerId,
}

impl<'a> BucketReader<'a> {
    /// Reader over a bucket whose leaf values are `RecordId`s
    pub fn new(handle: &'a PageHandle) -> Self {
        Self::with_value_serializer(handle, SerializerId::Link)
    }

    pub fn with_value_serializer(handle: &'a PageHandle, value_serializer: SerializerId) -> Self {
        Self {
            handle,
            value_serializer,
        }
    }
}

impl BucketRead for BucketReader<'_> {
    fn with_page<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let page = self.handle.page();
        f(&page[..])
    }

    fn value_serializer(&self) -> SerializerId {
        self.value_serializer
    }
}

// =============================================================================
// Mutating Bucket
// =============================================================================

/// Bucket bound to a page handle held by the single mutator
///
/// Every mutation except `init` pushes exactly one `PageOperation` onto the
/// handle. A failed mutation leaves both the page and the pending list as
/// they were.
pub struct Bucket<'a> {
    handle: &'a mut PageHandle,
    value_serializer: SerializerId,
}

impl BucketRead for Bucket<'_> {
    fn with_page<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let page = self.handle.page();
        f(&page[..])
    }

    fn value_serializer(&self) -> SerializerId {
        self.value_serializer
    }
}

impl<'a> Bucket<'a> {
    /// Bucket whose leaf values are `RecordId`s
    pub fn new(handle: &'a mut PageHandle) -> Self {
        Self::with_value_serializer(handle, SerializerId::Link)
    }

    /// Bucket whose leaf values are encoded by `value_serializer`
    pub fn with_value_serializer(handle: &'a mut PageHandle, value_serializer: SerializerId) -> Self {
        Self {
            handle,
            value_serializer,
        }
    }

    /// Reset to an empty bucket of the given kind
    ///
    /// A freshly allocated page has no previous state to return to, so
    /// nothing is logged.
    pub fn init(&mut self, is_leaf: bool) {
        layout::init(self.handle.page_mut(), is_leaf);
    }

    /// Insert a leaf entry at `index` (`index == size()` appends)
    ///
    /// `value` must be exactly one value encoded by the bucket's value codec.
    pub fn add_leaf_entry(&mut self, index: usize, key: &[u8], value: &[u8]) -> Result<()> {
        self.expect_kind(true)?;
        self.check_value(value)?;

        let entry = layout::leaf_entry(key, value);
        layout::insert_entry(self.handle.page_mut(), index, &entry)
            .map_err(|e| self.rejected("add_leaf_entry", e))?;

        self.log(OperationKind::AddLeafEntry {
            index: index as u32,
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    /// Insert a non-leaf entry with its child pointers at `index`
    pub fn add_non_leaf_entry(
        &mut self,
        index: usize,
        key: &[u8],
        left_child: i32,
        right_child: i32,
    ) -> Result<()> {
        self.expect_kind(false)?;

        let entry = layout::non_leaf_entry(left_child, right_child, key);
        layout::insert_entry(self.handle.page_mut(), index, &entry)
            .map_err(|e| self.rejected("add_non_leaf_entry", e))?;

        self.log(OperationKind::AddNonLeafEntry {
            index: index as u32,
            key: key.to_vec(),
            left_child,
            right_child,
        });
        Ok(())
    }

    /// Remove leaf entry `index` and reclaim its space
    pub fn remove_leaf_entry(
        &mut self,
        index: usize,
        encrypted: bool,
        key_serializer: SerializerId,
    ) -> Result<()> {
        self.expect_kind(true)?;

        let value_serializer = self.value_serializer;
        let page = self.handle.page_mut();
        let raw = layout::raw_entry(page, index, encrypted, key_serializer, value_serializer)?;
        let position = layout::entry_position(page, index)?;
        let key_size = layout::key_size(page, position, encrypted, key_serializer)?;
        layout::remove_entry(page, index, raw.len())?;

        let (key, value) = raw.split_at(key_size);
        self.log(OperationKind::RemoveLeafEntry {
            index: index as u32,
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    /// Remove non-leaf entry `index` and reclaim its space
    pub fn remove_non_leaf_entry(
        &mut self,
        index: usize,
        encrypted: bool,
        key_serializer: SerializerId,
    ) -> Result<()> {
        self.expect_kind(false)?;

        let value_serializer = self.value_serializer;
        let page = self.handle.page_mut();
        let raw = layout::raw_entry(page, index, encrypted, key_serializer, value_serializer)?;
        let (left_child, right_child) = layout::children(page, index)?;
        layout::remove_entry(page, index, raw.len())?;

        self.log(OperationKind::RemoveNonLeafEntry {
            index: index as u32,
            key: raw[layout::CHILD_POINTERS_SIZE..].to_vec(),
            left_child,
            right_child,
        });
        Ok(())
    }

    /// Append pre-serialized entries at the tail as one logged step
    ///
    /// All entries are added or none is. The record keeps the size before
    /// the call so undo can cut the bucket back to it.
    pub fn add_all(
        &mut self,
        raw_entries: Vec<Vec<u8>>,
        encrypted: bool,
        key_serializer: SerializerId,
    ) -> Result<()> {
        let page = self.handle.page_mut();
        let prev_size = layout::size(page);
        layout::append_entries(page, &raw_entries).map_err(|e| self.rejected("add_all", e))?;

        self.log(OperationKind::AddAll {
            prev_size: prev_size as u32,
            encrypted,
            key_serializer,
            raw_entries,
        });
        Ok(())
    }

    /// Truncate to `new_size` entries, logging the discarded tail
    pub fn shrink(
        &mut self,
        new_size: usize,
        encrypted: bool,
        key_serializer: SerializerId,
    ) -> Result<()> {
        let removed_entries = layout::truncate(self.handle.page_mut(), new_size)?;

        self.log(OperationKind::Shrink {
            new_size: new_size as u32,
            encrypted,
            key_serializer,
            removed_entries,
        });
        Ok(())
    }

    /// Overwrite the value of leaf entry `index` in place
    ///
    /// The new value must encode to the same size as the stored one.
    pub fn update_value(
        &mut self,
        index: usize,
        value: &[u8],
        encrypted: bool,
        key_serializer: SerializerId,
    ) -> Result<()> {
        self.expect_kind(true)?;
        self.check_value(value)?;

        let value_serializer = self.value_serializer;
        let page = self.handle.page_mut();
        let position = layout::entry_position(page, index)?;
        let key_size = layout::key_size(page, position, encrypted, key_serializer)?;
        let stored_size = value_serializer.object_size(page, position + key_size)?;
        if stored_size != value.len() {
            return Err(PageWalError::InvalidEntry(format!(
                "in-place update needs a {}-byte value, got {}",
                stored_size,
                value.len()
            )));
        }
        let prev_value = layout::write_value(page, index, key_size, value)?;

        self.log(OperationKind::UpdateValue {
            index: index as u32,
            key_size: key_size as u32,
            prev_value,
            value: value.to_vec(),
        });
        Ok(())
    }

    pub fn set_left_sibling(&mut self, sibling: i64) {
        let page = self.handle.page_mut();
        let prev_sibling = layout::left_sibling(page);
        layout::set_left_sibling(page, sibling);
        self.log(OperationKind::SetLeftSibling {
            prev_sibling,
            sibling,
        });
    }

    pub fn set_right_sibling(&mut self, sibling: i64) {
        let page = self.handle.page_mut();
        let prev_sibling = layout::right_sibling(page);
        layout::set_right_sibling(page, sibling);
        self.log(OperationKind::SetRightSibling {
            prev_sibling,
            sibling,
        });
    }

    fn expect_kind(&self, leaf: bool) -> Result<()> {
        if self.is_leaf() != leaf {
            let kind = if leaf { "leaf" } else { "non-leaf" };
            return Err(PageWalError::InvalidEntry(format!(
                "operation needs a {} bucket on page {}",
                kind,
                self.handle.page_id()
            )));
        }
        Ok(())
    }

    fn check_value(&self, value: &[u8]) -> Result<()> {
        match self.value_serializer.object_size(value, 0) {
            Ok(size) if size == value.len() => Ok(()),
            _ => Err(PageWalError::InvalidEntry(format!(
                "{} bytes are not one encoded {} value",
                value.len(),
                self.value_serializer
            ))),
        }
    }

    fn rejected(&self, operation: &str, err: PageWalError) -> PageWalError {
        if let PageWalError::CapacityExceeded { required, available } = &err {
            debug!(
                page = %self.handle.page_id(),
                operation,
                required,
                available,
                "bucket mutation rejected: page full"
            );
        }
        err
    }

    fn log(&mut self, kind: OperationKind) {
        let operation = PageOperation::new(self.handle.page_id(), kind);
        self.handle.push_operation(operation);
    }
}
