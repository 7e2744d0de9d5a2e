//! Async client for the heap protocol

use super::protocol::{
    decode_compaction, read_response, write_request, Request, StatsReport, Status,
};
use crate::codec::FixedCodec;
use crate::error::{Error, Result};
use crate::storage::heap::{Compaction, Segment};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Delay between connection attempts
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// One connection to a heap server; requests are issued one at a time
pub struct HeapClient {
    stream: TcpStream,
    next_token: i64,
}

impl HeapClient {
    /// Connect, retrying up to `max_attempts` times while the server refuses
    ///
    /// Errors other than a refused connection fail immediately.
    pub async fn connect(addr: SocketAddr, max_attempts: usize) -> Result<Self> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true).ok();
                    debug!("Connected to {} on attempt {}", addr, attempt);
                    return Ok(Self {
                        stream,
                        next_token: 1,
                    });
                }
                Err(e) if e.kind() == ErrorKind::ConnectionRefused && attempt < max_attempts => {
                    warn!(
                        "Connection to {} refused (attempt {}/{})",
                        addr, attempt, max_attempts
                    );
                    attempt += 1;
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    return Err(Error::Network(format!(
                        "Failed to connect to {}: {}",
                        addr, e
                    )))
                }
            }
        }
    }

    pub async fn allocate(&mut self, size: u64) -> Result<Segment> {
        let payload = self.call(Request::Allocate { size }).await?;
        Segment::decode(&payload, 0)
    }

    pub async fn free(&mut self, segment: Segment) -> Result<()> {
        self.call(Request::Free { segment }).await?;
        Ok(())
    }

    /// Write `data` to the start of `segment`
    pub async fn write(&mut self, segment: Segment, data: &[u8]) -> Result<()> {
        self.call(Request::Write {
            segment,
            data: data.to_vec(),
        })
        .await?;
        Ok(())
    }

    /// Read the first `count` bytes of `segment`
    pub async fn read(&mut self, segment: Segment, count: u64) -> Result<Vec<u8>> {
        self.call(Request::Read { segment, count }).await
    }

    pub async fn defragment(&mut self) -> Result<Compaction> {
        let payload = self.call(Request::Defragment).await?;
        decode_compaction(&payload)
    }

    /// Heap statistics plus the server's metrics text
    pub async fn stats(&mut self) -> Result<StatsReport> {
        let payload = self.call(Request::Stats).await?;
        serde_json::from_slice(&payload)
            .map_err(|e| Error::Codec(format!("Invalid stats payload: {}", e)))
    }

    async fn call(&mut self, request: Request) -> Result<Vec<u8>> {
        let token = self.next_token;
        self.next_token += 1;

        write_request(&mut self.stream, token, &request)
            .await
            .map_err(|e| Error::Network(format!("Failed to send request {}: {}", token, e)))?;
        let response = read_response(&mut self.stream)
            .await
            .map_err(|e| Error::Network(format!("Failed to read response {}: {}", token, e)))?;

        if response.token != token {
            return Err(Error::Network(format!(
                "Response token {} does not match request {}",
                response.token, token
            )));
        }

        match response.status {
            Status::Ok => Ok(response.payload),
            status => Err(status.into_error(String::from_utf8_lossy(&response.payload).into_owned())),
        }
    }
}
