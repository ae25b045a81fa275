//! # archivekv
//!
//! An append-only, multi-file key-value archive keyed by 20-byte content
//! hashes:
//! - Write-once records (first writer wins, no updates, no deletes)
//! - Fixed-capacity pages, each one file with a packed on-disk index
//! - Partial-key (prefix) lookups down to 3 bytes
//! - Transparent rollover to a new page when the newest one fills up
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Archive                              │
//! │        (newest page wins reads, newest page takes writes)   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!   ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!   │   Page 0    │ │   Page 1    │ │   Page N    │  one file each,
//!   │  (oldest)   │ │             │ │  (newest)   │  shared flock
//!   └──────┬──────┘ └─────────────┘ └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐        ┌──────────────────────┐
//!   │  HashIndex  │ ◄────► │ Packed index (on     │
//!   │ 256 buckets │  pack  │ disk, big-endian)    │
//!   └─────────────┘        └──────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use archivekv::Archive;
//!
//! # fn main() -> archivekv::Result<()> {
//! let mut archive = Archive::init("./");
//! archive.add_empty_page()?;
//! archive.set(&[7u8; 20], b"the data")?;
//! let saved = archive.save()?;
//! print!("{}", saved);
//! assert_eq!(archive.get(&[7u8; 20])?, b"the data");
//! archive.free()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod io;
pub mod naming;

pub mod index;
pub mod page;
pub mod archive;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ArchiveError, Result};
pub use config::Config;
pub use archive::{Archive, SaveResult, SavedPage, SharedArchive};
pub use index::{Key, KEY_SIZE, MAX_ITEMS_PER_INDEX, MIN_PARTIAL_KEY_LEN};
pub use naming::{NameGenerator, SequentialNameGenerator, UuidNameGenerator};
pub use page::{Fetched, Page};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of archivekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
