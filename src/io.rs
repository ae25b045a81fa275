//! Low-level file helpers
//!
//! Positioned reads/writes that loop over short transfers, and the
//! non-blocking advisory lock every page holds while it is open.
//!
//! The lock is `flock(2)`-based and purely cooperative: it only stops other
//! openers that also ask for it, never a process writing the file directly.

use std::fs::File;
use std::io::{self, ErrorKind};
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;

use crate::error::{ArchiveError, Result};

// =============================================================================
// Positioned I/O
// =============================================================================

/// Fill `buf` from `file` starting at `offset`.
///
/// Short reads are retried at the adjusted offset. Reaching end of file
/// before `buf` is full is a `ReadTruncated` error, never zero padding.
pub fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> Result<()> {
    let mut read = 0;
    while read < buf.len() {
        match file.read_at(&mut buf[read..], offset + read as u64) {
            Ok(0) => {
                return Err(ArchiveError::ReadTruncated {
                    offset,
                    expected: buf.len(),
                    read,
                })
            }
            Ok(n) => read += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Write all of `buf` to `file` starting at `offset`.
pub fn write_all_at(file: &File, buf: &[u8], offset: u64) -> Result<()> {
    let mut written = 0;
    while written < buf.len() {
        match file.write_at(&buf[written..], offset + written as u64) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    format!("wrote 0 bytes at offset {}", offset + written as u64),
                )
                .into())
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

// =============================================================================
// Advisory Locking
// =============================================================================

/// Take a shared advisory lock without waiting.
///
/// Fails at once with the OS error (kind `WouldBlock`) if someone holds an
/// exclusive lock on the same file.
pub fn lock_shared(file: &File) -> Result<()> {
    flock(file, libc::LOCK_SH | libc::LOCK_NB)
}

/// Release whatever advisory lock this descriptor holds.
pub fn unlock(file: &File) -> Result<()> {
    flock(file, libc::LOCK_UN)
}

fn flock(file: &File, operation: libc::c_int) -> Result<()> {
    loop {
        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != ErrorKind::Interrupted {
            return Err(err.into());
        }
    }
}
