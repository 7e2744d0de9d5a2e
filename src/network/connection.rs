//! Per-connection request loop.
//!
//! Each accepted socket gets one [`ConnectionHandler::handle`] task that
//! reads frames, executes them against the shared heap and writes one
//! response per request, in order.
//!
//! # Architecture
//!
//! ```text
//! Client → TCP → read_request → Request::decode → spawn_blocking → SegmentAllocator
//!                                     ↓                                  ↓
//!                               InvalidArgument                    Result<payload>
//!                                     └──────────→ ResponseMessage ←──────┘
//! ```
//!
//! Heap calls do blocking file I/O, so they run on the blocking pool and
//! never stall the reactor. Malformed payloads and heap errors become error
//! responses; only transport failures end the connection.

use super::protocol::{
    encode_compaction, read_request, write_response, Request, RequestFrame, ResponseMessage,
    Status, StatsReport, MAX_MESSAGE_SIZE,
};
use crate::codec::FixedCodec;
use crate::error::{Error, Result as HeapResult};
use crate::metrics::{self, ACTIVE_CONNECTIONS};
use crate::storage::heap::{Segment, SegmentAllocator};
use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Connection handler shared by all connection tasks
pub struct ConnectionHandler {
    heap: Arc<SegmentAllocator>,
}

impl ConnectionHandler {
    pub fn new(heap: Arc<SegmentAllocator>) -> Self {
        Self { heap }
    }

    /// Serve one client until it disconnects or shutdown is signalled
    pub async fn handle(
        &self,
        mut stream: TcpStream,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let peer = stream.peer_addr()?;
        ACTIVE_CONNECTIONS.inc();
        info!("Client connected: {}", peer);

        let result: Result<()> = async {
            loop {
                if *shutdown.borrow() {
                    debug!("Closing {} for shutdown", peer);
                    return Ok(());
                }

                let frame = tokio::select! {
                    _ = shutdown.changed() => return Ok(()),
                    frame = read_request(&mut stream) => frame?,
                };

                let Some(frame) = frame else {
                    info!("Client disconnected: {}", peer);
                    return Ok(());
                };

                let response = self.dispatch(frame).await;
                if response.status != Status::Ok {
                    warn!(
                        "Request {} from {} failed with {:?}",
                        response.token, peer, response.status
                    );
                }
                write_response(&mut stream, &response).await?;
            }
        }
        .await;

        ACTIVE_CONNECTIONS.dec();
        result
    }

    /// Execute one request frame and build its response
    pub async fn dispatch(&self, frame: RequestFrame) -> ResponseMessage {
        let token = frame.token;

        let request = match Request::decode(&frame) {
            Ok(request) => request,
            Err(e) => return ResponseMessage::error(token, &e),
        };
        debug!("Request {}: {:?}", token, request.opcode());

        let heap = self.heap.clone();
        match tokio::task::spawn_blocking(move || execute(&heap, request)).await {
            Ok(Ok(payload)) => ResponseMessage::ok(token, payload),
            Ok(Err(e)) => ResponseMessage::error(token, &e),
            Err(e) => ResponseMessage {
                token,
                status: Status::Internal,
                payload: format!("Request task failed: {}", e).into_bytes(),
            },
        }
    }
}

/// Route a request to its handler
fn execute(heap: &SegmentAllocator, request: Request) -> HeapResult<Vec<u8>> {
    match request {
        Request::Allocate { size } => handle_allocate(heap, size),
        Request::Free { segment } => handle_free(heap, segment),
        Request::Write { segment, data } => handle_write(heap, segment, &data),
        Request::Read { segment, count } => handle_read(heap, segment, count),
        Request::Defragment => handle_defragment(heap),
        Request::Stats => handle_stats(heap),
    }
}

fn handle_allocate(heap: &SegmentAllocator, size: u64) -> HeapResult<Vec<u8>> {
    Ok(heap.allocate(size)?.to_vec())
}

fn handle_free(heap: &SegmentAllocator, segment: Segment) -> HeapResult<Vec<u8>> {
    heap.free(segment)?;
    Ok(Vec::new())
}

fn handle_write(heap: &SegmentAllocator, segment: Segment, data: &[u8]) -> HeapResult<Vec<u8>> {
    heap.write(segment, data, 0, data.len())?;
    Ok(Vec::new())
}

/// Reads must fit in one response frame
fn handle_read(heap: &SegmentAllocator, segment: Segment, count: u64) -> HeapResult<Vec<u8>> {
    if count > u64::from(MAX_MESSAGE_SIZE) {
        return Err(Error::InvalidArgument(format!(
            "Read count {} exceeds the {} byte response limit",
            count, MAX_MESSAGE_SIZE
        )));
    }
    heap.read_to_vec(segment, count as usize)
}

fn handle_defragment(heap: &SegmentAllocator) -> HeapResult<Vec<u8>> {
    let compaction = heap.defragment()?;
    Ok(encode_compaction(&compaction))
}

fn handle_stats(heap: &SegmentAllocator) -> HeapResult<Vec<u8>> {
    let report = StatsReport {
        heap: heap.stats(),
        metrics: metrics::export_metrics(),
    };
    serde_json::to_vec(&report)
        .map_err(|e| Error::IoFailure(format!("Failed to encode stats: {}", e)))
}
