//! Free list management for the segment heap

use super::segment::Segment;

/// Address-ordered list of reusable segments
///
/// First-fit scans from the lowest pointer up, so freed holes near the start
/// of the file are reused before the tail. Adjacent entries are never merged
/// here; only compaction collapses the list.
#[derive(Debug, Default)]
pub struct FreeList {
    /// Disjoint segments sorted by pointer
    segments: Vec<Segment>,
}

impl FreeList {
    /// Create a free list holding a single segment
    pub fn new(initial: Segment) -> Self {
        Self {
            segments: vec![initial],
        }
    }

    /// Take `size` bytes from the first segment large enough
    ///
    /// An exact fit removes the entry. A larger one is split: the front is
    /// returned and the remainder stays in place.
    pub fn take_first_fit(&mut self, size: u64) -> Option<Segment> {
        let index = self.segments.iter().position(|s| s.size >= size)?;

        if self.segments[index].size == size {
            return Some(self.segments.remove(index));
        }

        Some(self.segments[index].split_front(size))
    }

    /// Return a segment to the free list at its address position
    pub fn push(&mut self, segment: Segment) {
        let index = self
            .segments
            .partition_point(|s| s.pointer < segment.pointer);
        self.segments.insert(index, segment);
    }

    /// Replace the whole list with at most one segment
    pub fn reset(&mut self, tail: Option<Segment>) {
        self.segments.clear();
        self.segments.extend(tail);
    }

    /// Iterate free segments in address order
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// Number of free segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total free bytes across all segments
    pub fn total_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.size).sum()
    }

    /// Size of the largest free segment
    pub fn largest(&self) -> u64 {
        self.segments.iter().map(|s| s.size).max().unwrap_or(0)
    }
}
