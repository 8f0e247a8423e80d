//! Redo and undo of page operations
//!
//! Both directions go straight to the layout primitives, so replaying a
//! record never appends to the handle's pending operations.

use tracing::trace;

use crate::bucket::layout;
use crate::error::{PageWalError, Result};
use crate::page::PageHandle;

use super::{OperationKind, PageOperation};

impl PageOperation {
    /// Re-apply the mutation
    ///
    /// `handle` must hold the page as it was right before the mutation.
    pub fn redo(&self, handle: &mut PageHandle) -> Result<()> {
        self.check_target(handle)?;
        trace!(page = %self.page_id, kind = %self.operation_type(), "redo");

        let page = handle.page_mut();
        match &self.kind {
            OperationKind::AddLeafEntry { index, key, value } => {
                layout::insert_entry(page, *index as usize, &layout::leaf_entry(key, value))
            }
            OperationKind::RemoveLeafEntry { index, key, value } => {
                layout::remove_entry(page, *index as usize, key.len() + value.len()).map(drop)
            }
            OperationKind::AddNonLeafEntry {
                index,
                key,
                left_child,
                right_child,
            } => layout::insert_entry(
                page,
                *index as usize,
                &layout::non_leaf_entry(*left_child, *right_child, key),
            ),
            OperationKind::RemoveNonLeafEntry { index, key, .. } => layout::remove_entry(
                page,
                *index as usize,
                layout::CHILD_POINTERS_SIZE + key.len(),
            )
            .map(drop),
            OperationKind::AddAll { raw_entries, .. } => {
                layout::append_entries(page, raw_entries)
            }
            OperationKind::Shrink { new_size, .. } => {
                layout::truncate(page, *new_size as usize).map(drop)
            }
            OperationKind::UpdateValue {
                index,
                key_size,
                value,
                ..
            } => layout::write_value(page, *index as usize, *key_size as usize, value).map(drop),
            OperationKind::SetLeftSibling { sibling, .. } => {
                layout::set_left_sibling(page, *sibling);
                Ok(())
            }
            OperationKind::SetRightSibling { sibling, .. } => {
                layout::set_right_sibling(page, *sibling);
                Ok(())
            }
        }
    }

    /// Reverse the mutation
    ///
    /// `handle` must hold the page as it was right after the mutation, with
    /// nothing applied in between.
    pub fn undo(&self, handle: &mut PageHandle) -> Result<()> {
        self.check_target(handle)?;
        trace!(page = %self.page_id, kind = %self.operation_type(), "undo");

        let page = handle.page_mut();
        match &self.kind {
            OperationKind::AddLeafEntry { index, key, value } => {
                layout::remove_entry(page, *index as usize, key.len() + value.len()).map(drop)
            }
            OperationKind::RemoveLeafEntry { index, key, value } => {
                layout::insert_entry(page, *index as usize, &layout::leaf_entry(key, value))
            }
            OperationKind::AddNonLeafEntry { index, key, .. } => layout::remove_entry(
                page,
                *index as usize,
                layout::CHILD_POINTERS_SIZE + key.len(),
            )
            .map(drop),
            OperationKind::RemoveNonLeafEntry {
                index,
                key,
                left_child,
                right_child,
            } => layout::insert_entry(
                page,
                *index as usize,
                &layout::non_leaf_entry(*left_child, *right_child, key),
            ),
            // The added entries are the tail, so cutting back suffices.
            OperationKind::AddAll { prev_size, .. } => {
                layout::truncate(page, *prev_size as usize).map(drop)
            }
            OperationKind::Shrink {
                removed_entries, ..
            } => layout::append_entries(page, removed_entries),
            OperationKind::UpdateValue {
                index,
                key_size,
                prev_value,
                ..
            } => {
                layout::write_value(page, *index as usize, *key_size as usize, prev_value).map(drop)
            }
            OperationKind::SetLeftSibling { prev_sibling, .. } => {
                layout::set_left_sibling(page, *prev_sibling);
                Ok(())
            }
            OperationKind::SetRightSibling { prev_sibling, .. } => {
                layout::set_right_sibling(page, *prev_sibling);
                Ok(())
            }
        }
    }

    fn check_target(&self, handle: &PageHandle) -> Result<()> {
        if handle.page_id() != self.page_id {
            return Err(PageWalError::PageMismatch {
                expected: self.page_id,
                actual: handle.page_id(),
            });
        }
        Ok(())
    }
}
