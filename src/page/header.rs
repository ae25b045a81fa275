//! Page file header
//!
//! Six big-endian u32 fields at offset 0. The layout constants are fixed at
//! compile time and every header read back from disk must agree with them.

use bytes::{Buf, BufMut};

use crate::error::{ArchiveError, Result};
use crate::index::{MAX_ITEMS_PER_INDEX, PACKED_ITEM_SIZE};

/// The only page file version this crate reads or writes
pub const FILE_VERSION: u32 = 1;

/// version, capacity, n_items, index_start, data_start, data_size: 6 × u32
pub const HEADER_SIZE: usize = 24;

/// Index slots reserved in every page file
pub const CAPACITY: usize = MAX_ITEMS_PER_INDEX;

/// Byte offset of the packed index block
pub const INDEX_START: u64 = HEADER_SIZE as u64;

/// Byte offset of the data region
pub const DATA_START: u64 = INDEX_START + (CAPACITY * PACKED_ITEM_SIZE) as u64;

/// Largest data region a header can describe (`data_size` is a u32)
pub const MAX_DATA_SIZE: u64 = u32::MAX as u64;

/// Header + index block, the part of the file `save` rewrites
pub const METADATA_SIZE: usize = DATA_START as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub capacity: u32,
    pub n_items: u32,
    pub index_start: u32,
    pub data_start: u32,
    pub data_size: u32,
}

impl FileHeader {
    /// Header for a page holding `n_items` items and `data_size` data bytes
    pub fn new(n_items: usize, data_size: u64) -> Result<Self> {
        Ok(Self {
            version: FILE_VERSION,
            capacity: CAPACITY as u32,
            n_items: u32::try_from(n_items).map_err(|_| ArchiveError::IndexOutOfBounds {
                items: n_items,
                capacity: CAPACITY,
            })?,
            index_start: INDEX_START as u32,
            data_start: DATA_START as u32,
            data_size: u32::try_from(data_size)
                .map_err(|_| ArchiveError::OffsetOverflow(data_size))?,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.version);
        buf.put_u32(self.capacity);
        buf.put_u32(self.n_items);
        buf.put_u32(self.index_start);
        buf.put_u32(self.data_start);
        buf.put_u32(self.data_size);
    }

    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut buf = &bytes[..];
        Self {
            version: buf.get_u32(),
            capacity: buf.get_u32(),
            n_items: buf.get_u32(),
            index_start: buf.get_u32(),
            data_start: buf.get_u32(),
            data_size: buf.get_u32(),
        }
    }

    /// Check this header against the compiled-in layout and the real file
    /// length.
    pub fn validate(&self, file_len: u64) -> Result<()> {
        if self.version != FILE_VERSION {
            return Err(ArchiveError::UnknownVersion(self.version));
        }
        if self.index_start as u64 != INDEX_START {
            return Err(ArchiveError::InvalidHeader(format!(
                "index_start is {}, expected {}",
                self.index_start, INDEX_START
            )));
        }
        if self.data_start as u64 != DATA_START {
            return Err(ArchiveError::InvalidHeader(format!(
                "data_start is {}, expected {}",
                self.data_start, DATA_START
            )));
        }
        if self.capacity as usize != CAPACITY {
            return Err(ArchiveError::InvalidHeader(format!(
                "capacity is {}, expected {}",
                self.capacity, CAPACITY
            )));
        }
        if self.n_items > self.capacity {
            return Err(ArchiveError::InvalidHeader(format!(
                "{} items exceed capacity {}",
                self.n_items, self.capacity
            )));
        }
        let data_end = self.data_start as u64 + self.data_size as u64;
        if data_end > file_len {
            return Err(ArchiveError::InvalidHeader(format!(
                "data region ends at {} but file is {} bytes",
                data_end, file_len
            )));
        }
        Ok(())
    }
}
