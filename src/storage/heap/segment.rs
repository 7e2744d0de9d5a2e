//! Segment handles for the heap

use serde::{Deserialize, Serialize};
use std::fmt;

/// A byte range inside the heap file
///
/// A segment is only a handle: it identifies `[pointer, pointer + size)` and
/// owns nothing. The allocator decides whether it is currently allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Segment {
    /// Byte offset into the heap
    pub pointer: u64,
    /// Length in bytes
    pub size: u64,
}

impl Segment {
    /// Size of a segment handle on the wire (two 8-byte integers)
    pub const ENCODED_LEN: usize = 16;

    /// Create a new segment
    pub fn new(pointer: u64, size: u64) -> Self {
        Self { pointer, size }
    }

    /// One past the last byte of this segment
    pub fn end(&self) -> u64 {
        self.pointer + self.size
    }

    /// Check whether two segments share at least one byte
    pub fn overlaps(&self, other: &Segment) -> bool {
        self.pointer < other.end() && other.pointer < self.end()
    }

    /// Split `size` bytes off the front of this segment
    ///
    /// Returns the carved segment and shrinks `self` in place. The caller
    /// guarantees `0 < size < self.size`.
    pub(crate) fn split_front(&mut self, size: u64) -> Segment {
        let front = Segment::new(self.pointer, size);
        self.pointer += size;
        self.size -= size;
        front
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Segment(pointer={}, size={})", self.pointer, self.size)
    }
}

/// A segment moved by compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    /// Handle before compaction (now stale)
    pub from: Segment,
    /// Handle after compaction
    pub to: Segment,
}
