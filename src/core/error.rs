//! Error type for buffer construction
//!
//! Running out of space or data is not an error: acquire calls report it by
//! returning `None`. The only recoverable failure is failing to obtain the
//! backing storage.

use std::io;

/// Failure to build a [`BipBuffer`](super::BipBuffer) or its storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing store of `capacity` bytes could not be allocated.
    #[error("failed to allocate {capacity} byte backing store")]
    AllocationFailure { capacity: usize },

    /// A zero-sized buffer was requested.
    #[error("buffer capacity must be non-zero")]
    InvalidCapacity,

    /// Mapping a file-backed store failed.
    #[error("storage i/o error: {0}")]
    Io(#[from] io::Error),
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::AllocationFailure { .. } => io::Error::new(io::ErrorKind::OutOfMemory, e),
            Error::InvalidCapacity => io::Error::new(io::ErrorKind::InvalidInput, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = Error::AllocationFailure { capacity: 64 };
        assert_eq!(e.to_string(), "failed to allocate 64 byte backing store");
        assert_eq!(
            Error::InvalidCapacity.to_string(),
            "buffer capacity must be non-zero"
        );
    }

    #[test]
    fn test_into_io_error() {
        let e: io::Error = Error::InvalidCapacity.into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);

        let e: io::Error = Error::AllocationFailure { capacity: 1 }.into();
        assert_eq!(e.kind(), io::ErrorKind::OutOfMemory);

        // wrapped i/o errors come back out unchanged
        let e: io::Error = Error::from(io::Error::from(io::ErrorKind::NotFound)).into();
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_io_source() {
        use std::error::Error as _;

        let e = Error::from(io::Error::new(io::ErrorKind::PermissionDenied, "mmap"));
        assert!(matches!(e, Error::Io(_)));
        assert_eq!(e.to_string(), "storage i/o error: mmap");
        assert!(e.source().is_some());
        assert!(Error::InvalidCapacity.source().is_none());
    }
}
