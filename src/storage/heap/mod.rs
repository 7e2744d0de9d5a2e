//! Segment Heap
//!
//! Variable-length byte regions inside a single growable file.
//!
//! # Architecture
//!
//! ```text
//! SegmentAllocator
//!   ├─→ used:  {0 → 100, 164 → 36}          (pointer → size)
//!   ├─→ free:  [100..164, 200..4096]         (address order, never merged)
//!   ├─→ current_heap_size: 4096  ≤  max_heap_size
//!   └─→ HeapFile "_data"  (positional I/O, length ≥ current_heap_size)
//!
//! defragment():
//!   [A][ ][B][  ][C][      ]   →   [A][B][C][               ]
//!                                   one free tail, handles remapped
//! ```
//!
//! One reader-writer lock guards the allocator state. Allocation, free and
//! compaction take it exclusively; reads and writes take it shared and do
//! their file I/O under that guard, so they never overlap a compaction.
//!
//! Nothing but the file contents is persisted. Reopening a heap starts from
//! a single free segment; callers must not expect old handles to survive a
//! restart. Only one process may write the file at a time.

pub mod allocator;
pub mod file;
pub mod free_list;
pub mod handles;
pub mod segment;

pub use allocator::{
    Compaction, HeapOptions, HeapStats, SegmentAllocator, DEFAULT_INITIAL_HEAP_SIZE,
    HEAP_FILE_NAME,
};
pub use file::HeapFile;
pub use free_list::FreeList;
pub use handles::{HandleHeap, HandleId};
pub use segment::{Relocation, Segment};
