//! Backing stores for the bip buffer
//!
//! The tracker only needs one contiguous, fixed-size byte range. Where that
//! range comes from (heap, a memory-mapped file, caller-owned memory) is
//! decided here.

use zeroize::Zeroize;

use super::error::Error;

/// Fixed-size contiguous byte range owned by a [`BipBuffer`](super::BipBuffer).
///
/// Implementations must never change length while owned by a buffer.
pub trait Storage {
    fn as_slice(&self) -> &[u8];

    fn as_mut_slice(&mut self) -> &mut [u8];

    #[inline(always)]
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[inline(always)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite every byte with zero.
    fn wipe(&mut self) {
        self.as_mut_slice().zeroize();
    }
}

/// Heap-allocated store.
///
/// Allocation is fallible: a failed request surfaces as
/// [`Error::AllocationFailure`] instead of aborting the process. Fresh heap
/// stores always start zeroed.
pub struct HeapStorage {
    bytes: Box<[u8]>,
}

impl HeapStorage {
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity);
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(capacity)
            .map_err(|_| Error::AllocationFailure { capacity })?;
        bytes.resize(capacity, 0);

        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }
}

impl Storage for HeapStorage {
    #[inline(always)]
    fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[inline(always)]
    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// Caller-owned memory, e.g. a static array or a stack buffer.
impl Storage for &mut [u8] {
    #[inline(always)]
    fn as_slice(&self) -> &[u8] {
        self
    }

    #[inline(always)]
    fn as_mut_slice(&mut self) -> &mut [u8] {
        self
    }
}
