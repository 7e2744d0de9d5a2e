//! Prometheus metrics for heap activity
//!
//! Features:
//! - Operation counters by kind and outcome
//! - Heap size, used bytes and free-list length gauges, labelled per heap file
//! - Compaction duration histogram
//! - Active protocol connections

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    pub static ref HEAP_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("heapstore_operations_total", "Total number of heap operations"),
        &["op", "status"]
    ).unwrap();

    pub static ref HEAP_SIZE_BYTES: IntGaugeVec = IntGaugeVec::new(
        Opts::new("heapstore_heap_size_bytes", "Logical heap size materialized on disk"),
        &["heap"]
    ).unwrap();

    pub static ref HEAP_USED_BYTES: IntGaugeVec = IntGaugeVec::new(
        Opts::new("heapstore_heap_used_bytes", "Bytes held by allocated segments"),
        &["heap"]
    ).unwrap();

    pub static ref HEAP_FREE_SEGMENTS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("heapstore_heap_free_segments", "Number of entries in the free list"),
        &["heap"]
    ).unwrap();

    pub static ref HEAP_GROWTH_BYTES: IntCounterVec = IntCounterVec::new(
        Opts::new("heapstore_heap_growth_bytes_total", "Total bytes added to the heap file by growth"),
        &["heap"]
    ).unwrap();

    pub static ref COMPACTION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "heapstore_compaction_duration_seconds",
            "Duration of defragmentation passes in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0])
    ).unwrap();

    pub static ref ACTIVE_CONNECTIONS: IntGauge = IntGauge::new(
        "heapstore_active_connections",
        "Number of active protocol connections"
    ).unwrap();
}

/// Register all metrics with the global registry
///
/// Safe to call more than once; duplicate registrations are ignored.
pub fn init_metrics() {
    info!("Initializing Prometheus metrics");

    METRICS_REGISTRY.register(Box::new(HEAP_OPERATIONS.clone())).ok();
    METRICS_REGISTRY.register(Box::new(HEAP_SIZE_BYTES.clone())).ok();
    METRICS_REGISTRY.register(Box::new(HEAP_USED_BYTES.clone())).ok();
    METRICS_REGISTRY.register(Box::new(HEAP_FREE_SEGMENTS.clone())).ok();
    METRICS_REGISTRY.register(Box::new(HEAP_GROWTH_BYTES.clone())).ok();
    METRICS_REGISTRY.register(Box::new(COMPACTION_DURATION.clone())).ok();
    METRICS_REGISTRY.register(Box::new(ACTIVE_CONNECTIONS.clone())).ok();
}

/// Count one heap operation under its outcome
pub fn record_operation<T>(op: &str, result: &crate::error::Result<T>) {
    use crate::error::Error;

    let status = match result {
        Ok(_) => "ok",
        Err(Error::InvalidArgument(_)) => "invalid_argument",
        Err(Error::NotFound(_)) => "not_found",
        Err(Error::CapacityExceeded(_)) => "capacity_exceeded",
        Err(Error::IoFailure(_)) => "io_failure",
        Err(_) => "error",
    };
    HEAP_OPERATIONS.with_label_values(&[op, status]).inc();
}

/// Update the gauges of one heap after a mutation
///
/// `heap` is the heap's file path, so several heaps in one process keep
/// separate series.
pub fn observe_heap(heap: &str, heap_size: u64, used_bytes: u64, free_segments: usize) {
    HEAP_SIZE_BYTES.with_label_values(&[heap]).set(heap_size as i64);
    HEAP_USED_BYTES.with_label_values(&[heap]).set(used_bytes as i64);
    HEAP_FREE_SEGMENTS.with_label_values(&[heap]).set(free_segments as i64);
}

/// Export all metrics in Prometheus text format
pub fn export_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("# Error converting metrics\n"))
}
