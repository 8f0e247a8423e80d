//! Bucket page layout
//!
//! Byte-level primitives over a page slice. Nothing here records page
//! operations: `Bucket` logs on top of these, and redo/undo call them
//! directly.
//!
//! ```text
//! 0        4      8    12           20           28
//! ┌────────┬──────┬────┬────────────┬────────────┬──────────────┬ ─ ─ ┬─────────────┐
//! │free(4) │size 4│leaf│left sib (8)│right sib(8)│ slots (4*n) ▶│ ... │◀ entry data │
//! └────────┴──────┴────┴────────────┴────────────┴──────────────┴ ─ ─ ┴─────────────┘
//!                                                                     ▲
//!                                                               free pointer
//! ```
//!
//! Every mutating function validates before it writes, so an error leaves
//! the page untouched.

use crate::error::{PageWalError, Result};
use crate::serializer::{read_len_prefix, slice_at, SerializerId};

pub const FREE_POINTER_OFFSET: usize = 0;
pub const SIZE_OFFSET: usize = 4;
pub const IS_LEAF_OFFSET: usize = 8;
pub const LEFT_SIBLING_OFFSET: usize = 12;
pub const RIGHT_SIBLING_OFFSET: usize = 20;
pub const POSITIONS_ARRAY_OFFSET: usize = 28;

/// Directory slot width
pub const SLOT_SIZE: usize = 4;

/// Left and right child pointers at the head of a non-leaf entry
pub const CHILD_POINTERS_SIZE: usize = 8;

/// Sibling value meaning "no sibling"
pub const NO_SIBLING: i64 = -1;

// =============================================================================
// Header Access
// =============================================================================

fn read_u32(page: &[u8], offset: usize) -> usize {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&page[offset..offset + 4]);
    u32::from_le_bytes(raw) as usize
}

fn write_u32(page: &mut [u8], offset: usize, value: usize) {
    page[offset..offset + 4].copy_from_slice(&(value as u32).to_le_bytes());
}

fn read_i64(page: &[u8], offset: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&page[offset..offset + 8]);
    i64::from_le_bytes(raw)
}

fn read_i32(page: &[u8], offset: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&page[offset..offset + 4]);
    i32::from_le_bytes(raw)
}

pub(crate) fn init(page: &mut [u8], is_leaf: bool) {
    let page_size = page.len();
    write_u32(page, FREE_POINTER_OFFSET, page_size);
    write_u32(page, SIZE_OFFSET, 0);
    page[IS_LEAF_OFFSET] = u8::from(is_leaf);
    page[IS_LEAF_OFFSET + 1..LEFT_SIBLING_OFFSET].fill(0);
    page[LEFT_SIBLING_OFFSET..LEFT_SIBLING_OFFSET + 8].copy_from_slice(&NO_SIBLING.to_le_bytes());
    page[RIGHT_SIBLING_OFFSET..RIGHT_SIBLING_OFFSET + 8].copy_from_slice(&NO_SIBLING.to_le_bytes());
}

pub(crate) fn size(page: &[u8]) -> usize {
    read_u32(page, SIZE_OFFSET)
}

pub(crate) fn is_leaf(page: &[u8]) -> bool {
    page[IS_LEAF_OFFSET] != 0
}

pub(crate) fn free_pointer(page: &[u8]) -> usize {
    read_u32(page, FREE_POINTER_OFFSET)
}

pub(crate) fn left_sibling(page: &[u8]) -> i64 {
    read_i64(page, LEFT_SIBLING_OFFSET)
}

pub(crate) fn right_sibling(page: &[u8]) -> i64 {
    read_i64(page, RIGHT_SIBLING_OFFSET)
}

pub(crate) fn set_left_sibling(page: &mut [u8], sibling: i64) {
    page[LEFT_SIBLING_OFFSET..LEFT_SIBLING_OFFSET + 8].copy_from_slice(&sibling.to_le_bytes());
}

pub(crate) fn set_right_sibling(page: &mut [u8], sibling: i64) {
    page[RIGHT_SIBLING_OFFSET..RIGHT_SIBLING_OFFSET + 8].copy_from_slice(&sibling.to_le_bytes());
}

/// Bytes left between the end of the directory and the free pointer
pub(crate) fn free_space(page: &[u8]) -> usize {
    let directory_end = POSITIONS_ARRAY_OFFSET + size(page) * SLOT_SIZE;
    free_pointer(page).saturating_sub(directory_end)
}

// =============================================================================
// Entry Addressing
// =============================================================================

fn slot_offset(index: usize) -> usize {
    POSITIONS_ARRAY_OFFSET + index * SLOT_SIZE
}

fn check_read_index(page: &[u8], index: usize) -> Result<()> {
    let size = size(page);
    if index >= size {
        return Err(PageWalError::OutOfBounds { index, size });
    }
    Ok(())
}

fn check_insert_index(page: &[u8], index: usize) -> Result<()> {
    let size = size(page);
    if index > size {
        return Err(PageWalError::OutOfBounds { index, size });
    }
    Ok(())
}

/// Start offset of entry `index` inside the page
pub(crate) fn entry_position(page: &[u8], index: usize) -> Result<usize> {
    check_read_index(page, index)?;
    let position = read_u32(page, slot_offset(index));
    if position < free_pointer(page) || position >= page.len() {
        return Err(PageWalError::Decode(format!(
            "entry {} points at offset {} outside the data region",
            index, position
        )));
    }
    Ok(position)
}

/// Size of the key encoded at `offset`
pub(crate) fn key_size(
    page: &[u8],
    offset: usize,
    encrypted: bool,
    key_serializer: SerializerId,
) -> Result<usize> {
    if encrypted {
        let len = read_len_prefix(page, offset)?;
        slice_at(page, offset + 4, len)?;
        Ok(4 + len)
    } else {
        key_serializer.object_size(page, offset)
    }
}

/// Full size of entry `index` in bytes
pub(crate) fn entry_size(
    page: &[u8],
    index: usize,
    encrypted: bool,
    key_serializer: SerializerId,
    value_serializer: SerializerId,
) -> Result<usize> {
    let position = entry_position(page, index)?;
    let size = if is_leaf(page) {
        let key_size = key_size(page, position, encrypted, key_serializer)?;
        key_size + value_serializer.object_size(page, position + key_size)?
    } else {
        CHILD_POINTERS_SIZE
            + key_size(page, position + CHILD_POINTERS_SIZE, encrypted, key_serializer)?
    };
    slice_at(page, position, size)?;
    Ok(size)
}

/// Exact bytes of entry `index`
pub(crate) fn raw_entry(
    page: &[u8],
    index: usize,
    encrypted: bool,
    key_serializer: SerializerId,
    value_serializer: SerializerId,
) -> Result<Vec<u8>> {
    let position = entry_position(page, index)?;
    let size = entry_size(page, index, encrypted, key_serializer, value_serializer)?;
    Ok(page[position..position + size].to_vec())
}

/// Exact bytes of every entry, sized from the data region alone
///
/// Entries fill `free_pointer..page_end` without gaps, so each entry ends
/// where the next higher one starts. No codec is needed.
pub(crate) fn packed_entries(page: &[u8]) -> Result<Vec<Vec<u8>>> {
    let size = size(page);
    let mut positions = Vec::with_capacity(size);
    for index in 0..size {
        positions.push(entry_position(page, index)?);
    }

    let mut starts = positions.clone();
    starts.sort_unstable();
    if starts.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(PageWalError::Decode(
            "two directory slots point at the same entry".to_string(),
        ));
    }

    let mut entries = Vec::with_capacity(size);
    for position in positions {
        let next = starts.partition_point(|start| *start <= position);
        let end = starts.get(next).copied().unwrap_or(page.len());
        entries.push(page[position..end].to_vec());
    }
    Ok(entries)
}

/// Key bytes of entry `index`
pub(crate) fn raw_key(
    page: &[u8],
    index: usize,
    encrypted: bool,
    key_serializer: SerializerId,
) -> Result<Vec<u8>> {
    let mut position = entry_position(page, index)?;
    if !is_leaf(page) {
        position += CHILD_POINTERS_SIZE;
    }
    let size = key_size(page, position, encrypted, key_serializer)?;
    Ok(page[position..position + size].to_vec())
}

/// Child pointers `(left, right)` of non-leaf entry `index`
pub(crate) fn children(page: &[u8], index: usize) -> Result<(i32, i32)> {
    if is_leaf(page) {
        return Err(PageWalError::InvalidEntry(
            "leaf entries have no child pointers".to_string(),
        ));
    }
    let position = entry_position(page, index)?;
    slice_at(page, position, CHILD_POINTERS_SIZE)?;
    Ok((read_i32(page, position), read_i32(page, position + 4)))
}

pub(crate) fn leaf_entry(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut entry = Vec::with_capacity(key.len() + value.len());
    entry.extend_from_slice(key);
    entry.extend_from_slice(value);
    entry
}

pub(crate) fn non_leaf_entry(left_child: i32, right_child: i32, key: &[u8]) -> Vec<u8> {
    let mut entry = Vec::with_capacity(CHILD_POINTERS_SIZE + key.len());
    entry.extend_from_slice(&left_child.to_le_bytes());
    entry.extend_from_slice(&right_child.to_le_bytes());
    entry.extend_from_slice(key);
    entry
}

// =============================================================================
// Mutation Primitives
// =============================================================================

fn check_capacity(page: &[u8], required: usize) -> Result<()> {
    if free_pointer(page) > page.len() {
        return Err(PageWalError::Decode(format!(
            "free pointer {} lies beyond the page end {}",
            free_pointer(page),
            page.len()
        )));
    }
    let available = free_space(page);
    if required > available {
        return Err(PageWalError::CapacityExceeded {
            required,
            available,
        });
    }
    Ok(())
}

/// Insert `entry` at logical position `index`
///
/// Entry bytes go to the low end of the data region; directory slots from
/// `index` on move up by one.
pub(crate) fn insert_entry(page: &mut [u8], index: usize, entry: &[u8]) -> Result<()> {
    check_insert_index(page, index)?;
    check_capacity(page, entry.len() + SLOT_SIZE)?;

    let size = size(page);
    let position = free_pointer(page) - entry.len();
    page[position..position + entry.len()].copy_from_slice(entry);

    page.copy_within(slot_offset(index)..slot_offset(size), slot_offset(index + 1));
    write_u32(page, slot_offset(index), position);
    write_u32(page, SIZE_OFFSET, size + 1);
    write_u32(page, FREE_POINTER_OFFSET, position);
    Ok(())
}

/// Append every entry at the tail, or none if they do not all fit
pub(crate) fn append_entries(page: &mut [u8], entries: &[Vec<u8>]) -> Result<()> {
    let required: usize = entries.iter().map(|entry| entry.len() + SLOT_SIZE).sum();
    check_capacity(page, required)?;

    for entry in entries {
        let size = size(page);
        insert_entry(page, size, entry)?;
    }
    Ok(())
}

/// Remove entry `index` whose size is `entry_len`, returning its bytes
///
/// The data region is compacted: entries stored below the removed one slide
/// up by `entry_len` and their slots are adjusted.
pub(crate) fn remove_entry(page: &mut [u8], index: usize, entry_len: usize) -> Result<Vec<u8>> {
    let position = entry_position(page, index)?;
    slice_at(page, position, entry_len)?;

    let size = size(page);
    let free = free_pointer(page);
    let removed = page[position..position + entry_len].to_vec();

    page.copy_within(free..position, free + entry_len);
    for slot in 0..size {
        if slot == index {
            continue;
        }
        let other = read_u32(page, slot_offset(slot));
        if other < position {
            write_u32(page, slot_offset(slot), other + entry_len);
        }
    }

    page.copy_within(slot_offset(index + 1)..slot_offset(size), slot_offset(index));
    write_u32(page, SIZE_OFFSET, size - 1);
    write_u32(page, FREE_POINTER_OFFSET, free + entry_len);
    Ok(removed)
}

/// Keep the first `new_size` entries, returning the discarded tail
///
/// Retained entries are rewritten contiguously from the page end.
pub(crate) fn truncate(page: &mut [u8], new_size: usize) -> Result<Vec<Vec<u8>>> {
    let size = size(page);
    if new_size > size {
        return Err(PageWalError::OutOfBounds {
            index: new_size,
            size,
        });
    }

    let mut retained = packed_entries(page)?;
    let removed = retained.split_off(new_size);

    let page_size = page.len();
    write_u32(page, FREE_POINTER_OFFSET, page_size);
    write_u32(page, SIZE_OFFSET, 0);
    append_entries(page, &retained)?;
    Ok(removed)
}

/// Overwrite the value of leaf entry `index`, returning the previous value
pub(crate) fn write_value(
    page: &mut [u8],
    index: usize,
    key_size: usize,
    value: &[u8],
) -> Result<Vec<u8>> {
    if !is_leaf(page) {
        return Err(PageWalError::InvalidEntry(
            "values can only be updated in leaf buckets".to_string(),
        ));
    }
    let position = entry_position(page, index)? + key_size;
    let previous = slice_at(page, position, value.len())?.to_vec();
    page[position..position + value.len()].copy_from_slice(value);
    Ok(previous)
}
