//! Memory-mapped backing store
//!
//! Lets a bip buffer live in page-cache backed memory instead of the heap:
//! - File-backed: bytes land in the file, `flush` pushes dirty pages to disk
//! - Anonymous: private mapping, useful for very large staging areas
//!
//! Only the raw bytes are mapped. Region state lives in the tracker and is
//! not persisted.

use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use tracing::debug;

use super::error::Error;
use super::storage::Storage;

/// Mmap-backed storage
pub struct MmapStorage {
    mmap: MmapMut,
}

impl MmapStorage {
    /// Creates or opens a file of exactly `capacity` bytes and maps it
    /// read/write.
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity);
        }

        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        file.set_len(capacity as u64)?;

        // SAFETY: the file is opened read/write and sized before mapping.
        // Concurrent modification by other processes is the caller's concern.
        let mmap = unsafe { MmapOptions::new().len(capacity).map_mut(&file)? };

        debug!(path = %path.display(), capacity, "mapped file-backed storage");

        Ok(Self { mmap })
    }

    /// Maps `capacity` bytes of anonymous memory.
    pub fn anonymous(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity);
        }

        let mmap = MmapOptions::new()
            .len(capacity)
            .map_anon()
            .map_err(|e| match e.kind() {
                io::ErrorKind::OutOfMemory => Error::AllocationFailure { capacity },
                _ => Error::Io(e),
            })?;

        debug!(capacity, "mapped anonymous storage");

        Ok(Self { mmap })
    }

    /// Writes dirty pages back to the underlying file.
    pub fn flush(&self) -> io::Result<()> {
        self.mmap.flush()
    }
}

impl Storage for MmapStorage {
    #[inline(always)]
    fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    #[inline(always)]
    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }
}
