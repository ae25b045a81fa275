//! Configuration for archivekv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for an Archive
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory that page filenames are resolved against
    pub base_dir: PathBuf,

    /// Existing page filenames to open, oldest first
    pub pages: Vec<String>,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// fsync each page after a save that actually wrote something
    pub sync_on_save: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./"),
            pages: Vec::new(),
            sync_on_save: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the base directory for page files
    pub fn base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.base_dir = path.into();
        self
    }

    /// Add an existing page to open (call in oldest-first order)
    pub fn page(mut self, filename: impl Into<String>) -> Self {
        self.config.pages.push(filename.into());
        self
    }

    /// Replace the list of existing pages to open
    pub fn pages<I, S>(mut self, filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.pages = filenames.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable fsync after each dirty page save
    pub fn sync_on_save(mut self, sync: bool) -> Self {
        self.config.sync_on_save = sync;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
