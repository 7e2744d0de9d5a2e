//! Segment allocator implementation

use super::file::HeapFile;
use super::free_list::FreeList;
use super::segment::{Relocation, Segment};
use crate::error::{Error, Result};
use crate::metrics;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Heap size materialized when a heap is opened
pub const DEFAULT_INITIAL_HEAP_SIZE: u64 = 4096;

/// Name of the backing file inside the heap directory
pub const HEAP_FILE_NAME: &str = "_data";

/// Options for opening a heap
#[derive(Debug, Clone)]
pub struct HeapOptions {
    /// Size of the single free segment a fresh heap starts with
    pub initial_heap_size: u64,
    /// Hard ceiling for heap growth
    pub max_heap_size: u64,
    /// Backing file name inside the heap directory
    pub file_name: String,
}

impl HeapOptions {
    pub fn new(max_heap_size: u64) -> Self {
        Self {
            initial_heap_size: DEFAULT_INITIAL_HEAP_SIZE,
            max_heap_size,
            file_name: HEAP_FILE_NAME.to_string(),
        }
    }
}

/// Mutable allocator state, always locked as one unit
#[derive(Debug)]
struct HeapState {
    /// Allocation table: pointer -> size
    used: BTreeMap<u64, u64>,
    /// Bytes held by `used`
    used_bytes: u64,
    free: FreeList,
    current_heap_size: u64,
    /// `heap` label value for this heap's metric series
    metrics_label: String,
}

impl HeapState {
    fn contains(&self, segment: Segment) -> bool {
        self.used.get(&segment.pointer) == Some(&segment.size)
    }

    /// Every byte of `[0, current_heap_size)` not covered by `used`
    fn gaps(&self) -> Vec<Segment> {
        let mut gaps = Vec::new();
        let mut cursor = 0;
        for (&pointer, &size) in &self.used {
            if pointer > cursor {
                gaps.push(Segment::new(cursor, pointer - cursor));
            }
            cursor = pointer + size;
        }
        if cursor < self.current_heap_size {
            gaps.push(Segment::new(cursor, self.current_heap_size - cursor));
        }
        gaps
    }

    fn publish(&self) {
        metrics::observe_heap(
            &self.metrics_label,
            self.current_heap_size,
            self.used_bytes,
            self.free.len(),
        );
    }
}

/// Result of a defragmentation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compaction {
    /// Segments whose pointer changed; every `from` handle is now stale
    pub relocations: Vec<Relocation>,
    /// The single free segment left after compaction, if any space remains
    pub free_tail: Option<Segment>,
    /// Bytes physically copied
    pub moved_bytes: u64,
}

impl Compaction {
    /// Map a handle issued before compaction to its current value
    ///
    /// Handles that were not moved are returned unchanged.
    pub fn resolve(&self, segment: Segment) -> Segment {
        self.relocations
            .iter()
            .find(|r| r.from == segment)
            .map(|r| r.to)
            .unwrap_or(segment)
    }
}

/// Segment allocator over a single growable file
///
/// Allocation is first-fit with splitting over an uncoalesced free list.
/// When nothing fits the heap grows at its end, up to `max_heap_size`.
/// Fragmentation is only reclaimed by [`SegmentAllocator::defragment`].
pub struct SegmentAllocator {
    /// Directory holding the heap file
    base_path: PathBuf,
    max_heap_size: u64,
    file: HeapFile,
    state: RwLock<HeapState>,
}

impl SegmentAllocator {
    /// Open a heap in `base_path` with the default initial size
    pub fn new<P: AsRef<Path>>(base_path: P, max_heap_size: u64) -> Result<Self> {
        Self::with_options(base_path, HeapOptions::new(max_heap_size))
    }

    /// Open a heap with explicit options
    ///
    /// The free list is not persisted: an existing file is reopened with a
    /// fresh state holding one free segment over the initial size.
    pub fn with_options<P: AsRef<Path>>(base_path: P, options: HeapOptions) -> Result<Self> {
        if options.max_heap_size == 0 {
            return Err(Error::InvalidArgument(
                "max_heap_size must be greater than zero".to_string(),
            ));
        }
        if options.initial_heap_size == 0 {
            return Err(Error::InvalidArgument(
                "initial_heap_size must be greater than zero".to_string(),
            ));
        }

        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)
            .map_err(|e| Error::IoFailure(format!("Failed to create heap directory: {}", e)))?;

        let initial = options.initial_heap_size.min(options.max_heap_size);
        let file = HeapFile::open(base_path.join(&options.file_name))?;
        file.ensure_len(initial)?;

        info!(
            path = ?file.path(),
            initial_heap_size = initial,
            max_heap_size = options.max_heap_size,
            "Opened segment heap"
        );

        let state = HeapState {
            used: BTreeMap::new(),
            used_bytes: 0,
            free: FreeList::new(Segment::new(0, initial)),
            current_heap_size: initial,
            metrics_label: file.path().display().to_string(),
        };
        state.publish();

        Ok(Self {
            base_path,
            max_heap_size: options.max_heap_size,
            file,
            state: RwLock::new(state),
        })
    }

    /// Allocate a segment of exactly `size` bytes
    pub fn allocate(&self, size: u64) -> Result<Segment> {
        let result = self.allocate_inner(size);
        metrics::record_operation("allocate", &result);
        result
    }

    fn allocate_inner(&self, size: u64) -> Result<Segment> {
        if size == 0 {
            return Err(Error::InvalidArgument(
                "allocation size must be greater than zero".to_string(),
            ));
        }

        let mut state = self.state.write();
        let segment = match state.free.take_first_fit(size) {
            Some(segment) => segment,
            None => self.grow(&mut state, size)?,
        };

        state.used.insert(segment.pointer, segment.size);
        state.used_bytes += segment.size;
        state.publish();

        debug!("Allocated {}", segment);
        Ok(segment)
    }

    /// Extend the heap at its end for a request the free list cannot serve
    fn grow(&self, state: &mut HeapState, size: u64) -> Result<Segment> {
        let current = state.current_heap_size;
        let new_size = current
            .checked_add(size)
            .filter(|&n| n <= self.max_heap_size)
            .ok_or_else(|| {
                warn!(
                    requested = size,
                    current_heap_size = current,
                    max_heap_size = self.max_heap_size,
                    "Heap growth refused"
                );
                Error::CapacityExceeded(format!(
                    "Requested {} bytes at heap size {} exceeds maximum heap size {}",
                    size, current, self.max_heap_size
                ))
            })?;

        self.file.zero_extend(current, new_size)?;
        // Only advanced once the file covers the new extent
        state.current_heap_size = new_size;
        metrics::HEAP_GROWTH_BYTES
            .with_label_values(&[state.metrics_label.as_str()])
            .inc_by(size);

        info!(from = current, to = new_size, "Grew heap");
        Ok(Segment::new(current, size))
    }

    /// Return an allocated segment to the free list
    ///
    /// Freeing a segment that is not allocated (double free, stale or foreign
    /// handle) is an error.
    pub fn free(&self, segment: Segment) -> Result<()> {
        let result = self.free_inner(segment);
        metrics::record_operation("free", &result);
        result
    }

    fn free_inner(&self, segment: Segment) -> Result<()> {
        let mut state = self.state.write();
        if !state.contains(segment) {
            return Err(Error::NotFound(format!("{} is not allocated", segment)));
        }

        state.used.remove(&segment.pointer);
        state.used_bytes -= segment.size;
        state.free.push(segment);
        state.publish();

        debug!("Freed {}", segment);
        Ok(())
    }

    /// Write `count` bytes from `buffer[offset..]` to the start of `segment`
    pub fn write(&self, segment: Segment, buffer: &[u8], offset: usize, count: usize) -> Result<()> {
        let result = self.write_inner(segment, buffer, offset, count);
        metrics::record_operation("write", &result);
        result
    }

    fn write_inner(&self, segment: Segment, buffer: &[u8], offset: usize, count: usize) -> Result<()> {
        validate_range(segment, buffer.len(), offset, count)?;

        // Shared guard held across the I/O so compaction cannot move the bytes
        let state = self.state.read();
        ensure_allocated(&state, segment)?;
        self.file.write_at(&buffer[offset..offset + count], segment.pointer)?;
        drop(state);

        debug!("Wrote {} bytes to {}", count, segment);
        Ok(())
    }

    /// Write all of `data` to the start of `segment`
    pub fn write_all(&self, segment: Segment, data: &[u8]) -> Result<()> {
        self.write(segment, data, 0, data.len())
    }

    /// Read `count` bytes from the start of `segment` into `buffer[offset..]`
    pub fn read_bytes(
        &self,
        segment: Segment,
        buffer: &mut [u8],
        offset: usize,
        count: usize,
    ) -> Result<()> {
        let result = self.read_inner(segment, buffer, offset, count);
        metrics::record_operation("read", &result);
        result
    }

    fn read_inner(&self, segment: Segment, buffer: &mut [u8], offset: usize, count: usize) -> Result<()> {
        validate_range(segment, buffer.len(), offset, count)?;

        let state = self.state.read();
        ensure_allocated(&state, segment)?;
        self.file.read_at(&mut buffer[offset..offset + count], segment.pointer)?;
        drop(state);

        debug!("Read {} bytes from {}", count, segment);
        Ok(())
    }

    /// Read the first `count` bytes of `segment`
    ///
    /// `count` and the handle are checked before the buffer is allocated.
    pub fn read_to_vec(&self, segment: Segment, count: usize) -> Result<Vec<u8>> {
        let checked = validate_range(segment, count, 0, count)
            .and_then(|()| ensure_allocated(&self.state.read(), segment));
        if let Err(e) = checked {
            let result = Err(e);
            metrics::record_operation("read", &result);
            return result;
        }

        let mut data = vec![0u8; count];
        self.read_bytes(segment, &mut data, 0, count)?;
        Ok(data)
    }

    /// Compact all allocated segments towards the start of the file
    ///
    /// Holds the state lock exclusively for the whole pass. Every moved
    /// segment gets a new pointer; the returned [`Compaction`] lists the
    /// `(old, new)` pairs so handle owners can re-map. The heap size and the
    /// physical file length are unchanged.
    pub fn defragment(&self) -> Result<Compaction> {
        let result = self.defragment_inner();
        metrics::record_operation("defragment", &result);
        result
    }

    fn defragment_inner(&self) -> Result<Compaction> {
        let start = Instant::now();
        let mut state = self.state.write();

        let segments: Vec<Segment> = state
            .used
            .iter()
            .map(|(&pointer, &size)| Segment::new(pointer, size))
            .collect();

        let mut compaction = Compaction::default();
        let mut cursor = 0u64;
        for segment in segments {
            if segment.pointer != cursor {
                if let Err(e) = self.file.copy_within(segment.pointer, cursor, segment.size) {
                    // Moves so far are committed in `used`; rebuild the free
                    // list from what is actually unoccupied
                    let gaps = state.gaps();
                    state.free.reset(None);
                    gaps.into_iter().for_each(|gap| state.free.push(gap));
                    state.publish();
                    return Err(e);
                }

                state.used.remove(&segment.pointer);
                state.used.insert(cursor, segment.size);

                let moved = Segment::new(cursor, segment.size);
                debug!("Relocated {} to {}", segment, moved);
                compaction.relocations.push(Relocation {
                    from: segment,
                    to: moved,
                });
                compaction.moved_bytes += segment.size;
            }
            cursor += segment.size;
        }

        let tail = (cursor < state.current_heap_size)
            .then(|| Segment::new(cursor, state.current_heap_size - cursor));
        state.free.reset(tail);
        compaction.free_tail = tail;
        state.publish();

        self.file.sync()?;
        drop(state);

        let elapsed = start.elapsed();
        metrics::COMPACTION_DURATION.observe(elapsed.as_secs_f64());
        info!(
            relocated = compaction.relocations.len(),
            moved_bytes = compaction.moved_bytes,
            elapsed_ms = elapsed.as_millis() as u64,
            "Defragmented heap"
        );

        Ok(compaction)
    }

    /// Check whether `segment` is currently allocated
    pub fn contains(&self, segment: Segment) -> bool {
        self.state.read().contains(segment)
    }

    /// Snapshot of allocated segments in pointer order
    pub fn used_segments(&self) -> Vec<Segment> {
        self.state
            .read()
            .used
            .iter()
            .map(|(&pointer, &size)| Segment::new(pointer, size))
            .collect()
    }

    /// Snapshot of the free list in list order
    pub fn free_segments(&self) -> Vec<Segment> {
        self.state.read().free.iter().copied().collect()
    }

    pub fn current_heap_size(&self) -> u64 {
        self.state.read().current_heap_size
    }

    pub fn max_heap_size(&self) -> u64 {
        self.max_heap_size
    }

    /// Directory holding the heap file
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get statistics about the heap
    pub fn stats(&self) -> HeapStats {
        let state = self.state.read();
        HeapStats {
            current_heap_size: state.current_heap_size,
            max_heap_size: self.max_heap_size,
            used_segments: state.used.len(),
            used_bytes: state.used_bytes,
            free_segments: state.free.len(),
            free_bytes: state.free.total_bytes(),
            largest_free_segment: state.free.largest(),
        }
    }

    /// Flush the heap file to disk
    pub fn flush(&self) -> Result<()> {
        self.file.sync()
    }
}

/// Bounds checks shared by read and write
fn validate_range(segment: Segment, buffer_len: usize, offset: usize, count: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::InvalidArgument(
            "count must be greater than zero".to_string(),
        ));
    }
    match offset.checked_add(count) {
        Some(end) if end <= buffer_len => {}
        _ => {
            return Err(Error::InvalidArgument(format!(
                "offset {} with count {} exceeds buffer length {}",
                offset, count, buffer_len
            )))
        }
    }
    if count as u64 > segment.size {
        return Err(Error::InvalidArgument(format!(
            "count {} exceeds size of {}",
            count, segment
        )));
    }
    Ok(())
}

fn ensure_allocated(state: &HeapState, segment: Segment) -> Result<()> {
    if state.contains(segment) {
        Ok(())
    } else {
        Err(Error::NotFound(format!("{} is not allocated", segment)))
    }
}

/// Statistics for the segment heap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapStats {
    pub current_heap_size: u64,
    pub max_heap_size: u64,
    pub used_segments: usize,
    pub used_bytes: u64,
    pub free_segments: usize,
    pub free_bytes: u64,
    pub largest_free_segment: u64,
}

impl HeapStats {
    /// Share of free bytes unusable for a single allocation of the largest
    /// free size (0.0 = one contiguous free region)
    pub fn fragmentation(&self) -> f64 {
        if self.free_bytes == 0 {
            return 0.0;
        }
        1.0 - self.largest_free_segment as f64 / self.free_bytes as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_heap(name: &str, max_heap_size: u64) -> Result<(PathBuf, SegmentAllocator)> {
        let temp_dir = std::env::temp_dir().join(format!("{}_{}", name, std::process::id()));
        std::fs::remove_dir_all(&temp_dir).ok();
        let heap = SegmentAllocator::new(&temp_dir, max_heap_size)?;
        Ok((temp_dir, heap))
    }

    #[test]
    fn test_allocator_basic() -> Result<()> {
        let (temp_dir, heap) = temp_heap("heap_test_basic", 1 << 20)?;

        let segment = heap.allocate(100)?;
        assert_eq!(segment, Segment::new(0, 100));

        let data = b"Hello, Heap!";
        heap.write_all(segment, data)?;
        assert_eq!(heap.read_to_vec(segment, data.len())?, data);

        heap.free(segment)?;
        assert!(!heap.contains(segment));

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_allocator_rejects_zero_sizes() -> Result<()> {
        let temp_dir = std::env::temp_dir().join(format!("heap_test_zero_{}", std::process::id()));
        assert!(matches!(
            SegmentAllocator::new(&temp_dir, 0),
            Err(Error::InvalidArgument(_))
        ));

        let heap = SegmentAllocator::new(&temp_dir, 8192)?;
        assert!(matches!(heap.allocate(0), Err(Error::InvalidArgument(_))));

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_allocator_reuse() -> Result<()> {
        let (temp_dir, heap) = temp_heap("heap_test_reuse", 8192)?;

        let a = heap.allocate(50)?;
        let b = heap.allocate(50)?;
        assert_eq!(b.pointer, a.end());

        heap.free(a)?;

        // Next allocation should reuse the freed hole exactly
        let c = heap.allocate(50)?;
        assert_eq!(c, Segment::new(a.pointer, 50));
        assert!(heap.contains(b));

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_allocator_grows_heap() -> Result<()> {
        let (temp_dir, heap) = temp_heap("heap_test_grow", 16384)?;

        let a = heap.allocate(4000)?;
        let b = heap.allocate(1000)?;

        assert_eq!(a, Segment::new(0, 4000));
        assert_eq!(b, Segment::new(4096, 1000));
        assert_eq!(heap.current_heap_size(), 5096);
        assert_eq!(heap.read_to_vec(b, 1000)?, vec![0u8; 1000]);

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_allocator_capacity() -> Result<()> {
        let (temp_dir, heap) = temp_heap("heap_test_capacity", 8192)?;

        heap.allocate(100)?;
        let err = heap.allocate(5000).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded(_)));
        assert_eq!(heap.current_heap_size(), 4096);

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_initial_size_clamped_to_max() -> Result<()> {
        let (temp_dir, heap) = temp_heap("heap_test_clamp", 1024)?;

        assert_eq!(heap.current_heap_size(), 1024);
        assert_eq!(heap.free_segments(), vec![Segment::new(0, 1024)]);
        heap.allocate(1024)?;
        assert!(matches!(heap.allocate(1), Err(Error::CapacityExceeded(_))));

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_bounds_validation() -> Result<()> {
        let (temp_dir, heap) = temp_heap("heap_test_bounds", 8192)?;
        let segment = heap.allocate(8)?;

        let buffer = [1u8; 16];
        assert!(matches!(heap.write(segment, &buffer, 0, 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(heap.write(segment, &buffer, 10, 8), Err(Error::InvalidArgument(_))));
        assert!(matches!(heap.write(segment, &buffer, 0, 9), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            heap.write(segment, &buffer, usize::MAX, 2),
            Err(Error::InvalidArgument(_))
        ));

        let mut out = [0u8; 4];
        assert!(matches!(heap.read_bytes(segment, &mut out, 2, 4), Err(Error::InvalidArgument(_))));

        let foreign = Segment::new(segment.pointer, 4);
        assert!(matches!(heap.write(foreign, &buffer, 0, 4), Err(Error::NotFound(_))));

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_read_to_vec_rejects_count_before_allocating() -> Result<()> {
        let (temp_dir, heap) = temp_heap("heap_test_read_count", 8192)?;
        let segment = heap.allocate(8)?;

        assert!(matches!(heap.read_to_vec(segment, usize::MAX), Err(Error::InvalidArgument(_))));
        assert!(matches!(heap.read_to_vec(segment, 1 << 46), Err(Error::InvalidArgument(_))));
        assert!(matches!(heap.read_to_vec(segment, 0), Err(Error::InvalidArgument(_))));

        // A forged handle with a huge size is rejected before any buffer exists
        let forged = Segment::new(segment.pointer, 1 << 46);
        assert!(matches!(heap.read_to_vec(forged, 1 << 46), Err(Error::NotFound(_))));

        assert_eq!(heap.read_to_vec(segment, 8)?.len(), 8);

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_partial_write_leaves_remainder() -> Result<()> {
        let (temp_dir, heap) = temp_heap("heap_test_partial", 8192)?;
        let segment = heap.allocate(8)?;

        heap.write_all(segment, &[9u8; 8])?;
        heap.write(segment, &[0, 1, 2, 3, 4, 5], 2, 3)?;

        assert_eq!(heap.read_to_vec(segment, 8)?, vec![2, 3, 4, 9, 9, 9, 9, 9]);

        let mut out = [0u8; 6];
        heap.read_bytes(segment, &mut out, 3, 3)?;
        assert_eq!(out, [0, 0, 0, 2, 3, 4]);

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_defragment_moves_and_reports() -> Result<()> {
        let (temp_dir, heap) = temp_heap("heap_test_defrag", 8192)?;

        let a = heap.allocate(100)?;
        let b = heap.allocate(200)?;
        let c = heap.allocate(300)?;
        heap.write_all(c, &[7u8; 300])?;
        heap.free(a)?;
        heap.free(b)?;

        let compaction = heap.defragment()?;
        let moved = compaction.resolve(c);

        assert_eq!(moved, Segment::new(0, 300));
        assert_eq!(compaction.relocations.len(), 1);
        assert_eq!(compaction.moved_bytes, 300);
        assert_eq!(compaction.free_tail, Some(Segment::new(300, 4096 - 300)));
        assert_eq!(heap.free_segments(), vec![Segment::new(300, 4096 - 300)]);

        assert!(matches!(heap.write_all(c, b"stale"), Err(Error::NotFound(_))));
        assert_eq!(heap.read_to_vec(moved, 300)?, vec![7u8; 300]);

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_defragment_full_heap_leaves_no_tail() -> Result<()> {
        let (temp_dir, heap) = temp_heap("heap_test_defrag_full", 4096)?;

        let a = heap.allocate(2048)?;
        heap.allocate(2048)?;

        let compaction = heap.defragment()?;
        assert!(compaction.relocations.is_empty());
        assert_eq!(compaction.free_tail, None);
        assert!(heap.free_segments().is_empty());
        assert!(heap.contains(a));

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_allocator_stats() -> Result<()> {
        let (temp_dir, heap) = temp_heap("heap_test_stats", 8192)?;

        let a = heap.allocate(100)?;
        heap.allocate(200)?;
        heap.free(a)?;

        let stats = heap.stats();
        assert_eq!(stats.current_heap_size, 4096);
        assert_eq!(stats.max_heap_size, 8192);
        assert_eq!(stats.used_segments, 1);
        assert_eq!(stats.used_bytes, 200);
        assert_eq!(stats.free_segments, 2);
        assert_eq!(stats.free_bytes, 4096 - 200);
        assert_eq!(stats.largest_free_segment, 4096 - 300);
        assert!(stats.fragmentation() > 0.0);

        heap.defragment()?;
        assert_eq!(heap.stats().fragmentation(), 0.0);

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_gauges_are_per_heap() -> Result<()> {
        let (small_dir, small) = temp_heap("heap_test_gauges_small", 8192)?;
        let (large_dir, large) = temp_heap("heap_test_gauges_large", 1 << 20)?;

        small.allocate(100)?;
        large.allocate(10_000)?;

        let small_label = small.state.read().metrics_label.clone();
        let large_label = large.state.read().metrics_label.clone();
        assert_ne!(small_label, large_label);

        let size = |label: &str| metrics::HEAP_SIZE_BYTES.with_label_values(&[label]).get();
        let used = |label: &str| metrics::HEAP_USED_BYTES.with_label_values(&[label]).get();
        assert_eq!(size(&small_label), 4096);
        assert_eq!(used(&small_label), 100);
        assert_eq!(size(&large_label), 4096 + 10_000);
        assert_eq!(used(&large_label), 10_000);

        std::fs::remove_dir_all(small_dir).ok();
        std::fs::remove_dir_all(large_dir).ok();
        Ok(())
    }
}
