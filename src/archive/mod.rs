//! Archive Module
//!
//! Presents an ordered set of pages as one key-value namespace.
//!
//! ## Responsibilities
//! - Open existing pages by name, create new ones through a [`NameGenerator`]
//! - Search pages newest → oldest for reads
//! - Route writes to the newest page, rolling over to a fresh page when it
//!   fills up
//! - Keep each key to a single physical copy (write-once `set`)
//!
//! Pages are stored oldest first; the last page is the most recent and is
//! the only one written to.

mod save;
mod shared;

pub use save::{SaveResult, SavedPage};
pub use shared::SharedArchive;

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{ArchiveError, Result};
use crate::index::{validate_partial_key, Key};
use crate::naming::{NameGenerator, UuidNameGenerator};
use crate::page::{check_value_size, Fetched, Page};

/// Multi-page, append-only key-value archive
///
/// Single owner, single thread. Wrap it in a [`SharedArchive`] to use it
/// from several threads.
pub struct Archive {
    config: Config,

    /// Oldest first; the last page takes all writes
    pages: Vec<Page>,

    /// Source of filenames for new pages
    names: Box<dyn NameGenerator>,
}

impl Archive {
    /// Create an empty archive over `base_dir`. Nothing is touched on disk.
    pub fn init(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_name_generator(
            Config::builder().base_dir(base_dir).build(),
            Box::new(UuidNameGenerator),
        )
    }

    /// Create an empty archive with an explicit config and name source.
    pub fn with_name_generator(config: Config, names: Box<dyn NameGenerator>) -> Self {
        Self {
            config,
            pages: Vec::new(),
            names,
        }
    }

    /// Open an archive from a config
    ///
    /// 1. Create `base_dir` if it doesn't exist
    /// 2. Open each configured page, oldest first
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with_name_generator(config, Box::new(UuidNameGenerator))
    }

    pub fn open_with_name_generator(config: Config, names: Box<dyn NameGenerator>) -> Result<Self> {
        if config.base_dir.exists() && !config.base_dir.is_dir() {
            return Err(ArchiveError::Config(format!(
                "base directory {} is not a directory",
                config.base_dir.display()
            )));
        }
        fs::create_dir_all(&config.base_dir)?;

        let filenames = config.pages.clone();
        let mut archive = Self::with_name_generator(config, names);
        for filename in &filenames {
            if let Err(e) = archive.add_page_by_name(filename) {
                // Already-opened pages must not leak their locks.
                let _ = archive.free();
                return Err(e);
            }
        }
        Ok(archive)
    }

    // =========================================================================
    // Page Management
    // =========================================================================

    /// Open the existing page `filename` and make it the most recent page.
    pub fn add_page_by_name(&mut self, filename: &str) -> Result<()> {
        let page = Page::open(&self.config.base_dir, filename, false)?;
        self.add_page(page);
        Ok(())
    }

    /// Create a page under a freshly generated name and make it the most
    /// recent page.
    pub fn add_empty_page(&mut self) -> Result<()> {
        let filename = self.names.generate();
        let page = Page::open(&self.config.base_dir, &filename, true)?;
        self.add_page(page);
        Ok(())
    }

    /// Append an already-open page as the most recent one.
    pub fn add_page(&mut self, page: Page) {
        tracing::debug!(page = page.filename(), position = self.pages.len(), "added page");
        self.pages.push(page);
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Resolve a 3..=20 byte prefix to a full key, newest page first.
    pub fn has_partial(&self, partial_key: &[u8]) -> Result<Option<Key>> {
        validate_partial_key(partial_key)?;
        for page in self.pages.iter().rev() {
            if let Some(key) = page.has_partial(partial_key)? {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    /// Exact-key membership across all pages
    pub fn has(&self, key: &Key) -> bool {
        self.pages.iter().rev().any(|page| page.has(key))
    }

    /// Look up a prefix, newest page first, and read its value.
    ///
    /// The first page that does not answer `KeyNotFound` decides the result:
    /// a read error there is returned, not masked by trying older pages.
    pub fn get_partial(&self, partial_key: &[u8], max_size: Option<usize>) -> Result<Fetched> {
        validate_partial_key(partial_key)?;
        for page in self.pages.iter().rev() {
            match page.get_partial(partial_key, max_size) {
                Ok(fetched) => return Ok(fetched),
                Err(ArchiveError::KeyNotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ArchiveError::KeyNotFound)
    }

    /// Full-key read of the whole value
    pub fn get(&self, key: &Key) -> Result<Vec<u8>> {
        self.get_partial(key, None).map(|fetched| fetched.data)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store `data` under `key` unless the key is already present.
    ///
    /// First writer wins: a second `set` for a key is a successful no-op.
    /// When the newest page is full a new page is added and the write is
    /// retried there once. A value too large for any page fails up front,
    /// before a page is created for it.
    pub fn set(&mut self, key: &Key, data: &[u8]) -> Result<()> {
        if self.has(key) {
            tracing::trace!("key already archived, skipping write");
            return Ok(());
        }
        check_value_size(data)?;

        match self.set_on_newest(key, data) {
            Err(e) if e.is_rollover() => {
                tracing::info!(
                    pages = self.pages.len(),
                    reason = %e,
                    "page full, rolling over to a new page"
                );
                self.add_empty_page()?;
                self.set_on_newest(key, data)
            }
            result => result,
        }
    }

    /// Write to the newest page. With no pages at all there is no room, which
    /// reads the same as a full page.
    fn set_on_newest(&mut self, key: &Key, data: &[u8]) -> Result<()> {
        match self.pages.last_mut() {
            Some(page) => page.set(key, data),
            None => Err(ArchiveError::IndexFull { capacity: 0 }),
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Save every page, oldest first.
    ///
    /// Stops at the first failure; pages saved before it stay saved.
    pub fn save(&mut self) -> Result<SaveResult> {
        let sync = self.config.sync_on_save;
        let mut result = SaveResult::default();
        for page in self.pages.iter_mut() {
            let has_changes = page.has_changes();
            let saved = page.save().and_then(|()| {
                if has_changes && sync {
                    page.sync()
                } else {
                    Ok(())
                }
            });
            if let Err(e) = saved {
                tracing::warn!(
                    page = page.filename(),
                    saved = result.len(),
                    error = %e,
                    "archive save stopped early"
                );
                return Err(e);
            }
            result.push(SavedPage {
                filename: page.filename().to_string(),
                has_changes,
            });
        }
        Ok(result)
    }

    /// Free every page and consume the archive.
    ///
    /// All pages are freed even if one fails; the first error is returned.
    pub fn free(self) -> Result<()> {
        let mut first_error = None;
        for page in self.pages {
            if let Err(e) = page.free() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pages, oldest first
    pub fn pages(&self) -> impl DoubleEndedIterator<Item = &Page> + '_ {
        self.pages.iter()
    }

    /// Items across all pages
    pub fn len(&self) -> usize {
        self.pages.iter().map(Page::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(Page::is_empty)
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("base_dir", &self.config.base_dir)
            .field("pages", &self.pages.len())
            .field("items", &self.len())
            .finish()
    }
}
