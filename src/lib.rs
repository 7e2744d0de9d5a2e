// heapstore - Persistent Segment Heap
// A file-backed, variable-length allocator with explicit compaction

#![warn(rust_2018_idioms)]

pub mod codec;
pub mod config;
pub mod metrics;
pub mod network;
pub mod storage;

// Re-exports for convenience
pub use codec::FixedCodec;
pub use storage::heap::{Compaction, HandleHeap, HandleId, HeapStats, Segment, SegmentAllocator};

/// heapstore error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        #[error("Not found: {0}")]
        NotFound(String),

        #[error("Capacity exceeded: {0}")]
        CapacityExceeded(String),

        #[error("I/O failure: {0}")]
        IoFailure(String),

        #[error("Codec error: {0}")]
        Codec(String),

        #[error("Network error: {0}")]
        Network(String),

        #[error("Configuration error: {0}")]
        Config(String),
    }

    impl Error {
        /// Whether a caller may reasonably retry the failed operation.
        ///
        /// Only I/O and transport failures are transient. Every other kind is
        /// a caller bug or needs outside intervention.
        pub fn is_retryable(&self) -> bool {
            matches!(self, Error::IoFailure(_) | Error::Network(_))
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
