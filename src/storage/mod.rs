//! Storage layer
//!
//! # Architecture
//!
//! ```text
//! HandleHeap (stable ids, optional)
//!   └─→ SegmentAllocator (first-fit, bounded growth, compaction)
//!        └─→ HeapFile (single flat file, positional I/O)
//! ```
//!
//! The heap keeps no on-disk index: callers remember the [`Segment`] handles
//! they are given (or use [`HandleHeap`] ids) and present them back for
//! reads, writes and frees.

pub mod heap;

pub use heap::{
    Compaction, HandleHeap, HandleId, HeapOptions, HeapStats, Relocation, Segment,
    SegmentAllocator,
};
