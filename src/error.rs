//! Error types for archivekv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ArchiveError
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Unified error type for archive operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Read truncated at offset {offset}: expected {expected} bytes, got {read}")]
    ReadTruncated {
        offset: u64,
        expected: usize,
        read: usize,
    },

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Index full: capacity of {capacity} items reached")]
    IndexFull { capacity: usize },

    #[error("Index out of bounds: {items} items do not fit in {capacity} slots")]
    IndexOutOfBounds { items: usize, capacity: usize },

    #[error("Invalid partial key length: {0} (expected 3..=20)")]
    InvalidPartialKeyLength(usize),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Page Errors
    // -------------------------------------------------------------------------
    #[error("Data region full: {data_size} bytes stored, {requested} more requested")]
    DataRegionFull { data_size: u64, requested: usize },

    #[error("Value of {size} bytes is larger than a page's {max}-byte data region")]
    ValueTooLarge { size: usize, max: u64 },

    #[error("Offset {0} does not fit the on-disk 32-bit field")]
    OffsetOverflow(u64),

    #[error("Invalid archive header: {0}")]
    InvalidHeader(String),

    #[error("Unknown archive version: {0}")]
    UnknownVersion(u32),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ArchiveError {
    /// Whether this error means "this page can take no more items".
    ///
    /// The archive answers these by starting a new page.
    pub fn is_rollover(&self) -> bool {
        matches!(
            self,
            ArchiveError::IndexFull { .. } | ArchiveError::DataRegionFull { .. }
        )
    }

    /// Whether this is the ordinary "key absent" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::KeyNotFound)
    }
}
