//! Producer/consumer handles over one bip buffer
//!
//! The tracker itself is single-threaded. Splitting it moves it behind a
//! mutex shared by exactly one [`Producer`] and one [`Consumer`]; each call
//! takes the lock for the duration of one acquire/release pair, so a
//! committed write is visible to the next read and freed space is visible
//! to the next write.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::bip_buffer::BipBuffer;
use super::storage::{HeapStorage, Storage};

struct Shared<S: Storage> {
    buffer: Mutex<BipBuffer<S>>,
    // Signalled after a write commits bytes
    readable: Condvar,
    // Signalled after a read frees bytes
    writable: Condvar,
}

impl<S: Storage> Shared<S> {
    #[inline(always)]
    fn lock(&self) -> MutexGuard<'_, BipBuffer<S>> {
        // A panic inside a caller's closure leaves the region state intact
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Storage> BipBuffer<S> {
    /// Splits the buffer into its write side and its read side.
    pub fn split(self) -> (Producer<S>, Consumer<S>) {
        let shared = Arc::new(Shared {
            buffer: Mutex::new(self),
            readable: Condvar::new(),
            writable: Condvar::new(),
        });

        (
            Producer {
                shared: Arc::clone(&shared),
            },
            Consumer { shared },
        )
    }
}

/// Write side of a split [`BipBuffer`].
pub struct Producer<S: Storage = HeapStorage> {
    shared: Arc<Shared<S>>,
}

impl<S: Storage> Producer<S> {
    /// Hands the largest free contiguous span to `fill`, then commits the
    /// number of bytes it returns.
    ///
    /// Returns 0 without calling `fill` when the buffer has no room.
    ///
    /// # Panics
    /// Panics if `fill` reports more bytes than the span it was given.
    pub fn write_with<F>(&mut self, fill: F) -> usize
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        let written = {
            let mut buffer = self.shared.lock();
            let Some(dst) = buffer.write_acquire() else {
                return 0;
            };
            let n = fill(dst);
            buffer.write_release(n);
            n
        };

        if written > 0 {
            self.shared.readable.notify_one();
        }
        written
    }

    /// Copies as much of `data` as fits. Returns bytes written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let written = self.shared.lock().write(data);
        if written > 0 {
            self.shared.readable.notify_one();
        }
        written
    }

    pub fn write_available(&self) -> usize {
        self.shared.lock().write_available()
    }

    pub fn capacity(&self) -> usize {
        self.shared.lock().capacity()
    }

    /// Blocks until some space is free or `timeout` elapses.
    pub fn wait_writable(&self, timeout: Duration) -> bool {
        let guard = self.shared.lock();
        let (guard, _) = self
            .shared
            .writable
            .wait_timeout_while(guard, timeout, |buffer| buffer.write_available() == 0)
            .unwrap_or_else(PoisonError::into_inner);
        guard.write_available() > 0
    }

    /// `false` once the consumer has been dropped.
    pub fn is_connected(&self) -> bool {
        Arc::strong_count(&self.shared) > 1
    }
}

/// Read side of a split [`BipBuffer`].
pub struct Consumer<S: Storage = HeapStorage> {
    shared: Arc<Shared<S>>,
}

impl<S: Storage> Consumer<S> {
    /// Hands the oldest contiguous committed span to `drain`, then consumes
    /// the number of bytes it returns.
    ///
    /// Returns 0 without calling `drain` when the buffer is empty.
    ///
    /// # Panics
    /// Panics if `drain` reports more bytes than the span it was given.
    pub fn read_with<F>(&mut self, drain: F) -> usize
    where
        F: FnOnce(&[u8]) -> usize,
    {
        let consumed = {
            let mut buffer = self.shared.lock();
            let Some(src) = buffer.read_acquire() else {
                return 0;
            };
            let n = drain(src);
            buffer.read_release(n);
            n
        };

        if consumed > 0 {
            self.shared.writable.notify_one();
        }
        consumed
    }

    /// Copies committed bytes into `out` and consumes them.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let read = self.shared.lock().read(out);
        if read > 0 {
            self.shared.writable.notify_one();
        }
        read
    }

    /// Runs `inspect` on the committed bytes at logical `offset` without
    /// consuming anything.
    pub fn peek_with<F, R>(&self, offset: usize, inspect: F) -> Option<R>
    where
        F: FnOnce(&[u8]) -> R,
    {
        self.shared.lock().peek(offset).map(inspect)
    }

    pub fn read_available(&self) -> usize {
        self.shared.lock().read_available()
    }

    /// Committed bytes across both regions.
    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().is_empty()
    }

    /// Blocks until data is committed or `timeout` elapses.
    pub fn wait_readable(&self, timeout: Duration) -> bool {
        let guard = self.shared.lock();
        let (guard, _) = self
            .shared
            .readable
            .wait_timeout_while(guard, timeout, |buffer| buffer.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        !guard.is_empty()
    }

    /// `false` once the producer has been dropped.
    pub fn is_connected(&self) -> bool {
        Arc::strong_count(&self.shared) > 1
    }
}
