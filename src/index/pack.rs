//! Packed index codec
//!
//! On disk the index is a flat array of fixed-size entries, big-endian
//! regardless of host:
//!
//! ```text
//! ┌──────────────────────┬──────────────────┬────────────────┐
//! │ Key (20)             │ DataOffset u32BE │ DataSize u32BE │  = 28 bytes
//! └──────────────────────┴──────────────────┴────────────────┘
//! ```
//!
//! Packing walks buckets 0x00..=0xFF and each bucket in insertion order, so
//! the output is fully determined by the index contents and their history.
//! Unpacking appends in file order, which puts every bucket back in the same
//! order it was packed in.

use bytes::{Buf, BufMut};

use crate::error::{ArchiveError, Result};

use super::{HashIndex, HashItem, Key, KEY_SIZE};

/// Size of one packed entry: key (20) + offset (4) + size (4)
pub const PACKED_ITEM_SIZE: usize = KEY_SIZE + 4 + 4;

/// On-disk form of a [`HashItem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedHashItem {
    pub key: Key,
    pub data_offset: u32,
    pub data_size: u32,
}

impl PackedHashItem {
    /// Narrow an in-memory item to its 32-bit on-disk fields
    pub fn from_item(item: &HashItem) -> Result<Self> {
        Ok(Self {
            key: item.key,
            data_offset: u32::try_from(item.data_offset)
                .map_err(|_| ArchiveError::OffsetOverflow(item.data_offset))?,
            data_size: u32::try_from(item.data_size)
                .map_err(|_| ArchiveError::OffsetOverflow(item.data_size))?,
        })
    }

    pub fn to_item(&self) -> HashItem {
        HashItem::new(self.key, self.data_offset as u64, self.data_size as u64)
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.key);
        buf.put_u32(self.data_offset);
        buf.put_u32(self.data_size);
    }

    /// Decode one entry; `buf` must hold at least `PACKED_ITEM_SIZE` bytes.
    pub fn decode(buf: &mut impl Buf) -> Self {
        let mut key = [0u8; KEY_SIZE];
        buf.copy_to_slice(&mut key);
        let data_offset = buf.get_u32();
        let data_size = buf.get_u32();
        Self {
            key,
            data_offset,
            data_size,
        }
    }
}

// =============================================================================
// HashIndex <-> packed items
// =============================================================================

pub(super) fn pack(index: &HashIndex, capacity: usize) -> Result<Vec<PackedHashItem>> {
    if index.len() > capacity {
        return Err(ArchiveError::IndexOutOfBounds {
            items: index.len(),
            capacity,
        });
    }
    index.iter().map(PackedHashItem::from_item).collect()
}

pub(super) fn unpack(items: &[PackedHashItem], index: &mut HashIndex) {
    // Packed items arrive grouped by first byte; only look the bucket up
    // again when the run changes.
    for run in items.chunk_by(|a, b| a.key[0] == b.key[0]) {
        let bucket = index.get_or_create_bucket(&run[0].key);
        for packed in run {
            bucket.push(packed.to_item());
        }
        index.n_items += run.len();
    }
}

// =============================================================================
// Index block
// =============================================================================

/// Write `capacity` packed slots: the index's items first, zeros after.
pub fn encode_index_block(
    index: &HashIndex,
    capacity: usize,
    buf: &mut impl BufMut,
) -> Result<usize> {
    let items = pack(index, capacity)?;
    for item in &items {
        item.encode(buf);
    }
    buf.put_bytes(0, (capacity - items.len()) * PACKED_ITEM_SIZE);
    Ok(items.len())
}

/// Decode the first `n_items` packed entries of an index block.
pub fn decode_index_block(block: &[u8], n_items: usize) -> Result<Vec<PackedHashItem>> {
    let needed = n_items * PACKED_ITEM_SIZE;
    if block.len() < needed {
        return Err(ArchiveError::IndexOutOfBounds {
            items: n_items,
            capacity: block.len() / PACKED_ITEM_SIZE,
        });
    }
    let mut buf = &block[..needed];
    Ok((0..n_items).map(|_| PackedHashItem::decode(&mut buf)).collect())
}
