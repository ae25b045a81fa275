//! Page Module
//!
//! One page = one backing file: a fixed header, a fixed-capacity packed
//! index, then the values themselves, back to back.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (24 bytes, all u32 big-endian)                       │
//! │   version | capacity | n_items | index_start | data_start   │
//! │   | data_size                                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Index Block (capacity × 28 bytes)                           │
//! │   [Key (20)][DataOffset u32BE][DataSize u32BE]              │
//! │   ... first n_items meaningful, remaining slots zeroed ...  │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Data Block (data_size bytes)                                │
//! │   raw values, no framing; only the index knows the bounds   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Values are written to the data block as soon as they are `set`; the
//! header and index only reach disk on `save`.

mod header;

pub use header::{
    FileHeader, CAPACITY, DATA_START, FILE_VERSION, HEADER_SIZE, INDEX_START, MAX_DATA_SIZE,
    METADATA_SIZE,
};

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use bytes::BytesMut;

use crate::error::{ArchiveError, Result};
use crate::index::{
    decode_index_block, encode_index_block, validate_partial_key, HashIndex, HashItem, Key,
    PACKED_ITEM_SIZE,
};
use crate::io;

/// A value read back from the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// The full key the lookup resolved to
    pub key: Key,
    /// The bytes read; shorter than `size` when a `max_size` cut it off
    pub data: Vec<u8>,
    /// Size of the stored value
    pub size: u64,
}

impl Fetched {
    /// Whether `data` holds less than the whole stored value
    pub fn is_truncated(&self) -> bool {
        (self.data.len() as u64) < self.size
    }
}

/// A single page file and its in-memory index
///
/// The page owns its descriptor, the shared advisory lock on it, and its
/// index. Release all three with [`Page::free`].
#[derive(Debug)]
pub struct Page {
    /// Name relative to the archive's base directory
    filename: String,
    /// Full path (base dir + filename)
    path: PathBuf,
    /// Open read/write, holding a shared flock
    file: File,
    index: HashIndex,
    /// End of the data region, relative to `DATA_START`
    data_size: u64,
    /// Set by `set` and on creation; cleared by `save`
    has_changes: bool,
}

impl Page {
    /// Open the page `filename` under `base_dir`.
    ///
    /// With `is_new` the file is created exclusively (an existing file is an
    /// error) and the page starts empty and dirty. Otherwise the file is
    /// opened read/write, its header validated and its index loaded.
    ///
    /// Either way a shared advisory lock is taken without waiting; if it is
    /// not available the open fails, and a file created by this call is
    /// removed again.
    pub fn open(base_dir: &Path, filename: &str, is_new: bool) -> Result<Self> {
        let path = base_dir.join(filename);

        let file = if is_new {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&path)?
        } else {
            OpenOptions::new().read(true).write(true).open(&path)?
        };

        if let Err(e) = io::lock_shared(&file) {
            if is_new {
                // only remove what this call created
                drop(file);
                let _ = fs::remove_file(&path);
            }
            return Err(e);
        }

        let loaded = if is_new {
            Ok((HashIndex::new(), 0))
        } else {
            Self::load(&file)
        };

        let (index, data_size) = match loaded {
            Ok(state) => state,
            Err(e) => {
                // release before the descriptor closes
                let _ = io::unlock(&file);
                return Err(e);
            }
        };

        tracing::debug!(
            path = %path.display(),
            is_new,
            items = index.len(),
            data_size,
            "opened page"
        );

        Ok(Self {
            filename: filename.to_string(),
            path,
            file,
            index,
            data_size,
            has_changes: is_new,
        })
    }

    /// Create a brand-new empty page (`open` with `is_new = true`)
    pub fn create(base_dir: &Path, filename: &str) -> Result<Self> {
        Self::open(base_dir, filename, true)
    }

    /// Open an existing page (`open` with `is_new = false`)
    pub fn load_existing(base_dir: &Path, filename: &str) -> Result<Self> {
        Self::open(base_dir, filename, false)
    }

    /// Read and validate header + index from an existing file
    fn load(file: &File) -> Result<(HashIndex, u64)> {
        let file_len = file.metadata()?.len();
        if file_len < HEADER_SIZE as u64 {
            return Err(ArchiveError::InvalidHeader(format!(
                "file is {} bytes, shorter than the {}-byte header",
                file_len, HEADER_SIZE
            )));
        }

        let mut raw = [0u8; HEADER_SIZE];
        io::read_exact_at(file, &mut raw, 0)?;
        let header = FileHeader::decode(&raw);
        header.validate(file_len)?;

        let n_items = header.n_items as usize;
        let mut block = vec![0u8; n_items * PACKED_ITEM_SIZE];
        io::read_exact_at(file, &mut block, INDEX_START)?;
        let packed = decode_index_block(&block, n_items)?;

        let mut index = HashIndex::new();
        index.unpack(&packed);

        let data_size = header.data_size as u64;
        if let Some(item) = index
            .iter()
            .find(|item| item.data_offset + item.data_size > data_size)
        {
            return Err(ArchiveError::InvalidHeader(format!(
                "index entry at offset {} with size {} overruns the {}-byte data region",
                item.data_offset, item.data_size, data_size
            )));
        }

        Ok((index, data_size))
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Resolve a 3..=20 byte prefix to the full key it matches, if any.
    pub fn has_partial(&self, partial_key: &[u8]) -> Result<Option<Key>> {
        validate_partial_key(partial_key)?;
        Ok(self.index.get(partial_key).map(|item| item.key))
    }

    /// Exact-key membership
    pub fn has(&self, key: &Key) -> bool {
        self.index.has(key)
    }

    /// Look up a prefix and read its value.
    ///
    /// Reads at most `max_size` bytes when given; the returned `size` is
    /// always the full stored size so callers can spot a partial read.
    pub fn get_partial(&self, partial_key: &[u8], max_size: Option<usize>) -> Result<Fetched> {
        validate_partial_key(partial_key)?;
        let item = self
            .index
            .get(partial_key)
            .ok_or(ArchiveError::KeyNotFound)?;
        tracing::trace!(
            page = %self.filename,
            offset = item.data_offset,
            size = item.data_size,
            "page hit"
        );
        let data = self.read_item(item, max_size)?;
        Ok(Fetched {
            key: item.key,
            data,
            size: item.data_size,
        })
    }

    /// Full-key read of the whole value
    pub fn get(&self, key: &Key) -> Result<Vec<u8>> {
        self.get_partial(key, None).map(|fetched| fetched.data)
    }

    fn read_item(&self, item: &HashItem, max_size: Option<usize>) -> Result<Vec<u8>> {
        let len = match max_size {
            Some(max) => item.data_size.min(max as u64),
            None => item.data_size,
        };
        let mut data = vec![0u8; len as usize];
        io::read_exact_at(&self.file, &mut data, DATA_START + item.data_offset)?;
        Ok(data)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Append `data` to the data region and index it under `key`.
    ///
    /// Fails with `ValueTooLarge` when `data` could not fit even an empty
    /// page, with `IndexFull` when the page already holds `CAPACITY` items,
    /// and with `DataRegionFull` when the data region would outgrow its u32
    /// size field. The page is unchanged in all three cases.
    pub fn set(&mut self, key: &Key, data: &[u8]) -> Result<()> {
        check_value_size(data)?;
        if self.index.is_full() {
            return Err(ArchiveError::IndexFull { capacity: CAPACITY });
        }
        let new_size = self.data_size + data.len() as u64;
        if new_size > MAX_DATA_SIZE {
            return Err(ArchiveError::DataRegionFull {
                data_size: self.data_size,
                requested: data.len(),
            });
        }

        let offset = self.data_size;
        io::write_all_at(&self.file, data, DATA_START + offset)?;
        self.index.set(key, offset, data.len() as u64)?;
        self.data_size = new_size;
        self.has_changes = true;
        Ok(())
    }

    /// Write header + index to the start of the file in one positioned write.
    ///
    /// Does nothing when the page has no unsaved changes. The filename never
    /// changes across saves.
    pub fn save(&mut self) -> Result<()> {
        if !self.has_changes {
            return Ok(());
        }

        let header = FileHeader::new(self.index.len(), self.data_size)?;
        let mut buf = BytesMut::with_capacity(METADATA_SIZE);
        header.encode(&mut buf);
        encode_index_block(&self.index, CAPACITY, &mut buf)?;
        debug_assert_eq!(buf.len(), METADATA_SIZE);

        io::write_all_at(&self.file, &buf, 0)?;
        self.has_changes = false;

        tracing::debug!(
            page = %self.filename,
            items = self.index.len(),
            data_size = self.data_size,
            "saved page"
        );
        Ok(())
    }

    /// Flush file contents to stable storage
    pub fn sync(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Release the lock, close the file and drop the index.
    pub fn free(mut self) -> Result<()> {
        self.index.free();
        let unlocked = io::unlock(&self.file);
        tracing::debug!(page = %self.filename, "freed page");
        drop(self.file);
        unlocked
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &HashIndex {
        &self.index
    }

    /// Number of items indexed in this page
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.index.is_full()
    }

    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    pub fn has_changes(&self) -> bool {
        self.has_changes
    }
}

/// Reject a value no page could ever hold.
pub(crate) fn check_value_size(data: &[u8]) -> Result<()> {
    if data.len() as u64 > MAX_DATA_SIZE {
        return Err(ArchiveError::ValueTooLarge {
            size: data.len(),
            max: MAX_DATA_SIZE,
        });
    }
    Ok(())
}
