//! Thread-shareable archive handle
//!
//! The archive itself is single-owner. This wraps one in a mutex so several
//! threads can hold a handle; every call takes the lock for its whole
//! duration, so operations never interleave.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::index::Key;
use crate::page::Fetched;

use super::{Archive, SaveResult};

/// Cloneable, mutex-guarded [`Archive`]
#[derive(Clone, Debug)]
pub struct SharedArchive {
    inner: Arc<Mutex<Archive>>,
}

impl SharedArchive {
    pub fn new(archive: Archive) -> Self {
        Self {
            inner: Arc::new(Mutex::new(archive)),
        }
    }

    pub fn has(&self, key: &Key) -> bool {
        self.inner.lock().has(key)
    }

    pub fn has_partial(&self, partial_key: &[u8]) -> Result<Option<Key>> {
        self.inner.lock().has_partial(partial_key)
    }

    pub fn get(&self, key: &Key) -> Result<Vec<u8>> {
        self.inner.lock().get(key)
    }

    pub fn get_partial(&self, partial_key: &[u8], max_size: Option<usize>) -> Result<Fetched> {
        self.inner.lock().get_partial(partial_key, max_size)
    }

    pub fn set(&self, key: &Key, data: &[u8]) -> Result<()> {
        self.inner.lock().set(key, data)
    }

    pub fn save(&self) -> Result<SaveResult> {
        self.inner.lock().save()
    }

    pub fn page_count(&self) -> usize {
        self.inner.lock().page_count()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Take the archive back out, e.g. to `free` it.
    ///
    /// Gives the handle back unchanged while other clones are still alive.
    pub fn into_inner(self) -> std::result::Result<Archive, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl From<Archive> for SharedArchive {
    fn from(archive: Archive) -> Self {
        Self::new(archive)
    }
}
