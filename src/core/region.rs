//! `(offset, length)` spans inside the backing store
//!
//! The tracker keeps three of these (region A, region B, the reservation)
//! instead of raw index fields. Every slice handed to callers is derived
//! from a `Region` through checked slicing.

use std::ops::Range;

/// Contiguous byte span `[start, start + len)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    pub start: usize,
    pub len: usize,
}

impl Region {
    pub const EMPTY: Region = Region { start: 0, len: 0 };

    #[inline(always)]
    pub const fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// One past the last byte.
    #[inline(always)]
    pub const fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Half-open overlap test. Empty regions never overlap anything.
    #[inline]
    pub fn overlaps(&self, other: &Region) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start < other.end()
            && other.start < self.end()
    }
}

/// Snapshot of the tracker state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Regions {
    /// Oldest committed data
    pub a: Region,
    /// Wrapped data at the buffer head, only live while `a` holds the tail
    pub b: Region,
    /// Outstanding write reservation
    pub reserve: Region,
}

impl Regions {
    /// Committed bytes in A and B.
    #[inline(always)]
    pub const fn committed(&self) -> usize {
        self.a.len + self.b.len
    }

    /// Panics with a description of the first broken invariant.
    pub fn check(&self, capacity: usize) {
        let Regions { a, b, reserve } = self;

        assert!(
            a.end() <= capacity,
            "region A {:?} exceeds capacity {}",
            a,
            capacity
        );
        if !b.is_empty() {
            assert_eq!(b.start, 0, "region B {:?} does not start at 0", b);
            assert!(b.end() <= a.start, "region B {:?} overlaps A {:?}", b, a);
        }
        if a.is_empty() {
            assert!(b.is_empty(), "region B {:?} live while A is empty", b);
            assert_eq!(a.start, 0, "empty region A left at offset {}", a.start);
        }
        assert!(
            reserve.end() <= capacity,
            "reservation {:?} exceeds capacity {}",
            reserve,
            capacity
        );
        assert!(
            !reserve.overlaps(a) && !reserve.overlaps(b),
            "reservation {:?} overlaps committed data (A {:?}, B {:?})",
            reserve,
            a,
            b
        );
        assert!(
            self.committed() + reserve.len <= capacity,
            "{} committed + {} reserved exceeds capacity {}",
            self.committed(),
            reserve.len,
            capacity
        );
    }
}
