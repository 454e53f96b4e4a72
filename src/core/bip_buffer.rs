//! Bipartite circular buffer
//!
//! One flat store split into at most two live regions:
//!
//! ```text
//!  0                                                          capacity
//!  ├── B (wrapped) ──┤░░░ free ░░░├──────── A (oldest) ────────┤░ free ░┤
//! ```
//!
//! Writers get a contiguous reservation, readers get A as one contiguous
//! slice. When the tail fills up, writes continue at the head as region B,
//! and B is promoted to A once A has been drained. Nothing is ever split
//! across the end of the store and nothing is ever compacted.
//!
//! The tracker does no locking. See [`split`](BipBuffer::split) for the
//! producer/consumer handles.

use std::fmt;

use tracing::{debug, trace};
use zeroize::Zeroize;

use super::error::Error;
use super::options::BufferOptions;
use super::region::{Region, Regions};
use super::storage::{HeapStorage, Storage};

/// Bip buffer over a fixed-size backing store.
pub struct BipBuffer<S: Storage = HeapStorage> {
    storage: S,
    regions: Regions,
    options: BufferOptions,
}

impl BipBuffer<HeapStorage> {
    /// Allocates a heap-backed buffer of `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        Self::with_options(capacity, BufferOptions::default())
    }

    pub fn with_options(capacity: usize, options: BufferOptions) -> Result<Self, Error> {
        Self::from_storage(HeapStorage::new(capacity)?, options)
    }
}

impl<S: Storage> BipBuffer<S> {
    /// Builds an empty buffer over `storage`.
    ///
    /// The buffer takes the storage's full length as its capacity.
    pub fn from_storage(storage: S, options: BufferOptions) -> Result<Self, Error> {
        if storage.is_empty() {
            return Err(Error::InvalidCapacity);
        }

        let mut buffer = Self {
            storage,
            regions: Regions::default(),
            options,
        };
        buffer.reset(options.zero_fill_on_init);

        Ok(buffer)
    }

    /// Drops all data and any outstanding reservation, optionally wiping the
    /// whole store.
    pub fn reset(&mut self, zero_fill: bool) {
        if zero_fill {
            self.storage.wipe();
        }
        self.regions = Regions::default();
    }

    /// Resets the buffer and hands the backing store back.
    pub fn teardown(mut self, zero_fill: bool) -> S {
        debug!(
            capacity = self.capacity(),
            discarded = self.len(),
            zero_fill,
            "tearing down bip buffer"
        );
        self.reset(zero_fill);
        self.storage
    }

    /// Reserves the largest contiguous free span.
    ///
    /// Returns `None` when there is no room. The reservation stays pending
    /// until [`write_release`](Self::write_release); acquiring again replaces
    /// it.
    pub fn write_acquire(&mut self) -> Option<&mut [u8]> {
        let reserve = self.next_reservation();
        if reserve.is_empty() {
            self.regions.reserve = Region::EMPTY;
            return None;
        }

        self.regions.reserve = reserve;
        self.check_invariants();

        Some(&mut self.storage.as_mut_slice()[reserve.range()])
    }

    /// Commits the first `len` bytes of the pending reservation.
    ///
    /// `len == 0` just drops the reservation.
    ///
    /// # Panics
    /// Panics if `len` exceeds the pending reservation.
    pub fn write_release(&mut self, len: usize) {
        let reserve = std::mem::take(&mut self.regions.reserve);
        assert!(
            len <= reserve.len,
            "write_release({}) exceeds reservation of {} bytes",
            len,
            reserve.len
        );

        if len == 0 {
            return;
        }

        let regions = &mut self.regions;
        if regions.a.is_empty() && regions.b.is_empty() {
            regions.a = Region::new(reserve.start, len);
        } else if reserve.start == regions.a.end() {
            regions.a.len += len;
        } else {
            if regions.b.is_empty() {
                trace!(len, a_start = regions.a.start, "write wrapped to buffer head");
            }
            regions.b.len += len;
        }

        self.check_invariants();
    }

    /// The oldest committed bytes (region A), or `None` when empty.
    #[inline]
    pub fn read_acquire(&self) -> Option<&[u8]> {
        let a = self.regions.a;
        if a.is_empty() {
            return None;
        }
        Some(&self.storage.as_slice()[a.range()])
    }

    /// Region A for in-place processing.
    #[inline]
    pub fn read_acquire_mut(&mut self) -> Option<&mut [u8]> {
        let a = self.regions.a;
        if a.is_empty() {
            return None;
        }
        Some(&mut self.storage.as_mut_slice()[a.range()])
    }

    /// Consumes `len` bytes from the front of region A.
    ///
    /// Wipes them first when the buffer was built with
    /// `zero_fill_on_consume`. Draining A completely promotes region B.
    ///
    /// # Panics
    /// Panics if `len` exceeds region A.
    #[inline]
    pub fn read_release(&mut self, len: usize) {
        self.release_front(len, self.options.zero_fill_on_consume);
    }

    /// Like [`read_release`](Self::read_release) but always wipes the
    /// consumed bytes.
    #[inline]
    pub fn read_release_zeroed(&mut self, len: usize) {
        self.release_front(len, true);
    }

    fn release_front(&mut self, len: usize, zero_fill: bool) {
        let a = self.regions.a;
        assert!(
            len <= a.len,
            "read_release({}) exceeds readable region of {} bytes",
            len,
            a.len
        );

        if zero_fill {
            self.storage.as_mut_slice()[a.start..a.start + len].zeroize();
        }

        if len < a.len {
            self.regions.a = Region::new(a.start + len, a.len - len);
        } else {
            if !self.regions.b.is_empty() {
                trace!(len = self.regions.b.len, "promoting region B");
            }
            self.regions.a = self.regions.b;
            self.regions.b = Region::EMPTY;
        }

        self.check_invariants();
    }

    /// Committed bytes at logical `offset` without consuming them.
    ///
    /// Offsets run over A then B. The slice ends where the region holding
    /// `offset` ends, so walking everything takes at most two calls.
    pub fn peek(&self, offset: usize) -> Option<&[u8]> {
        let Regions { a, b, .. } = self.regions;

        let span = if offset < a.len {
            Region::new(a.start + offset, a.len - offset)
        } else {
            let offset = offset - a.len;
            if offset >= b.len {
                return None;
            }
            Region::new(b.start + offset, b.len - offset)
        };

        Some(&self.storage.as_slice()[span.range()])
    }

    /// Bytes the next [`read_acquire`](Self::read_acquire) would return.
    #[inline(always)]
    pub fn read_available(&self) -> usize {
        self.regions.a.len
    }

    /// Bytes the next [`write_acquire`](Self::write_acquire) would grant.
    ///
    /// Does not touch a pending reservation.
    #[inline(always)]
    pub fn write_available(&self) -> usize {
        self.next_reservation().len
    }

    /// Copies as much of `data` as fits, using as many reservations as
    /// needed. Returns the number of bytes committed.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let mut written = 0;

        while written < data.len() {
            let Some(dst) = self.write_acquire() else {
                break;
            };
            let n = dst.len().min(data.len() - written);
            dst[..n].copy_from_slice(&data[written..written + n]);
            self.write_release(n);
            written += n;
        }

        written
    }

    /// Copies committed bytes into `out` and consumes them.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let mut read = 0;

        while read < out.len() {
            let Some(src) = self.read_acquire() else {
                break;
            };
            let n = src.len().min(out.len() - read);
            out[read..read + n].copy_from_slice(&src[..n]);
            self.read_release(n);
            read += n;
        }

        read
    }

    /// Copies committed bytes starting at logical `offset` into `out`
    /// without consuming them.
    pub fn copy_out(&self, offset: usize, out: &mut [u8]) -> usize {
        let mut copied = 0;

        while copied < out.len() {
            let Some(src) = self.peek(offset + copied) else {
                break;
            };
            let n = src.len().min(out.len() - copied);
            out[copied..copied + n].copy_from_slice(&src[..n]);
            copied += n;
        }

        copied
    }

    /// Consumes `len` bytes across A and B.
    ///
    /// # Panics
    /// Panics if `len` exceeds the committed length.
    pub fn consume(&mut self, len: usize) {
        assert!(
            len <= self.len(),
            "consume({}) exceeds {} committed bytes",
            len,
            self.len()
        );

        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(self.regions.a.len);
            self.read_release(n);
            remaining -= n;
        }
    }

    /// Both live spans in logical order. The second is empty unless the
    /// buffer has wrapped.
    pub fn spans(&self) -> (&[u8], &[u8]) {
        let Regions { a, b, .. } = self.regions;
        let bytes = self.storage.as_slice();
        (&bytes[a.range()], &bytes[b.range()])
    }

    /// Committed bytes in both regions.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.regions.committed()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.regions.a.is_empty()
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Length of the pending write reservation.
    #[inline(always)]
    pub fn reserved_len(&self) -> usize {
        self.regions.reserve.len
    }

    #[inline(always)]
    pub fn regions(&self) -> Regions {
        self.regions
    }

    #[inline(always)]
    pub fn options(&self) -> BufferOptions {
        self.options
    }

    /// Raw backing store, including free space.
    #[inline(always)]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Where the next reservation goes: after B if B is live, else after A
    /// unless the head has strictly more room.
    fn next_reservation(&self) -> Region {
        let Regions { a, b, .. } = self.regions;

        if !b.is_empty() {
            return Region::new(b.end(), a.start - b.end());
        }

        let tail_free = self.capacity() - a.end();
        if tail_free >= a.start {
            Region::new(a.end(), tail_free)
        } else {
            Region::new(0, a.start)
        }
    }

    #[inline(always)]
    fn check_invariants(&self) {
        if cfg!(debug_assertions) {
            self.regions.check(self.capacity());
        }
    }
}

impl<S: Storage> fmt::Debug for BipBuffer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BipBuffer")
            .field("capacity", &self.capacity())
            .field("a", &self.regions.a)
            .field("b", &self.regions.b)
            .field("reserve", &self.regions.reserve)
            .finish()
    }
}
