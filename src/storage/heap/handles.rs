//! Stable handle ids over the segment heap
//!
//! Raw [`Segment`] values go stale when compaction moves them. A
//! [`HandleHeap`] hands out small integer ids instead and rewrites its table
//! from the relocation report, so ids survive any number of compactions.

use super::allocator::{Compaction, SegmentAllocator};
use super::segment::Segment;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Stable identifier for an allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// Heap front-end addressing allocations by [`HandleId`]
pub struct HandleHeap {
    heap: Arc<SegmentAllocator>,
    table: RwLock<HashMap<HandleId, Segment>>,
    next_id: AtomicU64,
}

impl HandleHeap {
    pub fn new(heap: Arc<SegmentAllocator>) -> Self {
        Self {
            heap,
            table: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Underlying allocator
    pub fn heap(&self) -> &Arc<SegmentAllocator> {
        &self.heap
    }

    /// Allocate `size` bytes and return a stable id for them
    pub fn allocate(&self, size: u64) -> Result<HandleId> {
        let mut table = self.table.write();
        let segment = self.heap.allocate(size)?;
        let id = HandleId(self.next_id.fetch_add(1, Ordering::Relaxed));
        table.insert(id, segment);

        debug!("Issued {} for {}", id, segment);
        Ok(id)
    }

    /// Free the allocation behind `id`
    pub fn free(&self, id: HandleId) -> Result<()> {
        let mut table = self.table.write();
        let segment = lookup(&table, id)?;
        self.heap.free(segment)?;
        table.remove(&id);
        Ok(())
    }

    /// Current segment behind `id`
    pub fn segment(&self, id: HandleId) -> Result<Segment> {
        lookup(&self.table.read(), id)
    }

    /// Write `data` to the start of the allocation
    pub fn write(&self, id: HandleId, data: &[u8]) -> Result<()> {
        // Table guard held so compaction cannot remap the id mid-write
        let table = self.table.read();
        let segment = lookup(&table, id)?;
        self.heap.write_all(segment, data)
    }

    /// Read the first `count` bytes of the allocation
    pub fn read(&self, id: HandleId, count: usize) -> Result<Vec<u8>> {
        let table = self.table.read();
        let segment = lookup(&table, id)?;
        self.heap.read_to_vec(segment, count)
    }

    /// Compact the heap and remap every id to its new segment
    pub fn defragment(&self) -> Result<Compaction> {
        let mut table = self.table.write();
        let compaction = self.heap.defragment()?;

        let moved: HashMap<Segment, Segment> = compaction
            .relocations
            .iter()
            .map(|r| (r.from, r.to))
            .collect();
        for segment in table.values_mut() {
            if let Some(&to) = moved.get(segment) {
                *segment = to;
            }
        }

        debug!(remapped = moved.len(), "Remapped handles after compaction");
        Ok(compaction)
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }
}

fn lookup(table: &HashMap<HandleId, Segment>, id: HandleId) -> Result<Segment> {
    table
        .get(&id)
        .copied()
        .ok_or_else(|| Error::NotFound(format!("{} is not allocated", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_handles(name: &str) -> Result<(std::path::PathBuf, HandleHeap)> {
        let temp_dir = std::env::temp_dir().join(format!("{}_{}", name, std::process::id()));
        std::fs::remove_dir_all(&temp_dir).ok();
        let heap = Arc::new(SegmentAllocator::new(&temp_dir, 1 << 20)?);
        Ok((temp_dir, HandleHeap::new(heap)))
    }

    #[test]
    fn test_handles_survive_compaction() -> Result<()> {
        let (temp_dir, handles) = temp_handles("handle_heap_compact")?;

        let a = handles.allocate(64)?;
        let b = handles.allocate(32)?;
        let c = handles.allocate(16)?;
        handles.write(b, &[2u8; 32])?;
        handles.write(c, &[3u8; 16])?;
        handles.free(a)?;

        let before = handles.segment(b)?;
        let compaction = handles.defragment()?;

        assert_eq!(compaction.relocations.len(), 2);
        assert_ne!(handles.segment(b)?, before);
        assert_eq!(handles.segment(b)?.pointer, 0);
        assert_eq!(handles.read(b, 32)?, vec![2u8; 32]);
        assert_eq!(handles.read(c, 16)?, vec![3u8; 16]);
        assert_eq!(handles.len(), 2);

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }

    #[test]
    fn test_unknown_handle() -> Result<()> {
        let (temp_dir, handles) = temp_handles("handle_heap_unknown")?;

        let a = handles.allocate(8)?;
        handles.free(a)?;

        assert!(matches!(handles.free(a), Err(Error::NotFound(_))));
        assert!(matches!(handles.read(a, 1), Err(Error::NotFound(_))));
        assert!(matches!(handles.segment(HandleId(999)), Err(Error::NotFound(_))));
        assert!(handles.is_empty());

        std::fs::remove_dir_all(temp_dir).ok();
        Ok(())
    }
}
