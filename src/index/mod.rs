//! Hash Index Module
//!
//! In-memory index for one page: 20-byte key (or key prefix) → location of
//! the value inside that page's data region.
//!
//! ## Structure
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ HashIndex (n_items ≤ 2000)                   │
//! │ ┌────────┬────────┬────────┬─────┬────────┐  │
//! │ │ 0x00   │ 0x01   │ 0x02   │ ... │ 0xFF   │  │  one bucket per key[0]
//! │ └───┬────┴────────┴───┬────┴─────┴────────┘  │
//! │     ▼                 ▼                      │
//! │  [item, item]      [item]                    │  insertion order, no sorting
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Keys are content hashes, so the first byte spreads them evenly: a full
//! page averages about eight items per bucket, and a linear scan is enough.

mod pack;

pub use pack::{decode_index_block, encode_index_block, PackedHashItem, PACKED_ITEM_SIZE};

use crate::error::{ArchiveError, Result};

// =============================================================================
// Constants
// =============================================================================

/// Length of a full key in bytes
pub const KEY_SIZE: usize = 20;

/// Shortest prefix accepted for partial-key lookups
pub const MIN_PARTIAL_KEY_LEN: usize = 3;

/// Hard ceiling on items in a single index (and so in a single page)
pub const MAX_ITEMS_PER_INDEX: usize = 2000;

/// One bucket per possible value of the key's first byte
pub const BUCKET_COUNT: usize = 256;

/// Initial allocation for a bucket on first use
const BUCKET_INITIAL_CAPACITY: usize = 10;

/// A full 20-byte key
pub type Key = [u8; KEY_SIZE];

/// Check a partial key length against `3..=20`.
pub fn validate_partial_key(partial_key: &[u8]) -> Result<()> {
    if (MIN_PARTIAL_KEY_LEN..=KEY_SIZE).contains(&partial_key.len()) {
        Ok(())
    } else {
        Err(ArchiveError::InvalidPartialKeyLength(partial_key.len()))
    }
}

// =============================================================================
// HashItem
// =============================================================================

/// Location of one stored value, relative to its page's data region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashItem {
    pub key: Key,
    pub data_offset: u64,
    pub data_size: u64,
}

impl HashItem {
    pub fn new(key: Key, data_offset: u64, data_size: u64) -> Self {
        Self {
            key,
            data_offset,
            data_size,
        }
    }

    /// Does this item's key start with `partial_key`?
    ///
    /// Every byte of the prefix is compared.
    #[inline]
    pub fn matches(&self, partial_key: &[u8]) -> bool {
        self.key[..partial_key.len()] == *partial_key
    }
}

// =============================================================================
// HashBucket
// =============================================================================

/// All items whose key shares the same first byte, in insertion order
#[derive(Debug, Clone)]
pub struct HashBucket {
    items: Vec<HashItem>,
}

impl HashBucket {
    fn new() -> Self {
        Self {
            items: Vec::with_capacity(BUCKET_INITIAL_CAPACITY),
        }
    }

    /// First item whose key starts with `partial_key`
    pub fn get(&self, partial_key: &[u8]) -> Option<&HashItem> {
        self.items.iter().find(|item| item.matches(partial_key))
    }

    pub fn push(&mut self, item: HashItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[HashItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// HashIndex
// =============================================================================

/// Bucketed index with a fixed item ceiling
///
/// The index never deduplicates; keeping a key to one entry is the job of
/// the page/archive above it.
#[derive(Debug, Clone)]
pub struct HashIndex {
    /// Lazily allocated, indexed by `key[0]`
    buckets: [Option<HashBucket>; BUCKET_COUNT],
    /// Always equals the sum of bucket lengths
    n_items: usize,
}

impl HashIndex {
    /// Create an empty index (no bucket storage allocated yet)
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| None),
            n_items: 0,
        }
    }

    /// Bucket for `key[0]`, allocating its storage on first use.
    ///
    /// `key` must not be empty.
    pub fn get_or_create_bucket(&mut self, key: &[u8]) -> &mut HashBucket {
        self.buckets[key[0] as usize].get_or_insert_with(HashBucket::new)
    }

    /// Bucket for `first_byte`, if it has ever been used
    pub fn bucket(&self, first_byte: u8) -> Option<&HashBucket> {
        self.buckets[first_byte as usize].as_ref()
    }

    /// First item (in insertion order) whose key starts with `partial_key`.
    ///
    /// The caller guarantees `3 <= partial_key.len() <= 20`; pages check
    /// this with [`validate_partial_key`] before calling in.
    pub fn get(&self, partial_key: &[u8]) -> Option<&HashItem> {
        debug_assert!((MIN_PARTIAL_KEY_LEN..=KEY_SIZE).contains(&partial_key.len()));
        self.bucket(partial_key[0])?.get(partial_key)
    }

    /// Exact lookup on all 20 bytes
    pub fn has(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    /// Append a new item for `key`.
    ///
    /// Fails with `IndexFull`, leaving the index untouched, once it already
    /// holds `MAX_ITEMS_PER_INDEX` items.
    pub fn set(&mut self, key: &Key, data_offset: u64, data_size: u64) -> Result<()> {
        if self.is_full() {
            return Err(ArchiveError::IndexFull {
                capacity: MAX_ITEMS_PER_INDEX,
            });
        }
        self.push(HashItem::new(*key, data_offset, data_size));
        Ok(())
    }

    /// Append without the capacity check (used when rebuilding from disk)
    pub(crate) fn push(&mut self, item: HashItem) {
        self.get_or_create_bucket(&item.key).push(item);
        self.n_items += 1;
    }

    pub fn len(&self) -> usize {
        self.n_items
    }

    pub fn is_empty(&self) -> bool {
        self.n_items == 0
    }

    pub fn is_full(&self) -> bool {
        self.n_items >= MAX_ITEMS_PER_INDEX
    }

    /// All items, bucket 0x00 through 0xFF, insertion order within a bucket
    pub fn iter(&self) -> impl Iterator<Item = &HashItem> + '_ {
        self.buckets
            .iter()
            .flatten()
            .flat_map(|bucket| bucket.items().iter())
    }

    /// Release all bucket storage
    pub fn free(&mut self) {
        for bucket in self.buckets.iter_mut() {
            *bucket = None;
        }
        self.n_items = 0;
    }

    /// Serialize into packed on-disk items, failing if there are more than
    /// `capacity` of them.
    pub fn pack(&self, capacity: usize) -> Result<Vec<PackedHashItem>> {
        pack::pack(self, capacity)
    }

    /// Append packed items read from disk.
    ///
    /// Pages only call this on a fresh index, so afterwards `len()` equals
    /// `items.len()`. On a non-empty index the items are added to what is
    /// already there and `len()` still counts every item.
    pub fn unpack(&mut self, items: &[PackedHashItem]) {
        pack::unpack(items, self)
    }
}

impl Default for HashIndex {
    fn default() -> Self {
        Self::new()
    }
}
