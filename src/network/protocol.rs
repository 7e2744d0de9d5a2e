//! heapstore Wire Protocol
//!
//! Binary request/response framing over any byte stream. All integers are
//! little-endian and segment handles travel as 16 bytes (pointer, size).
//!
//! ```text
//! Request:  [u32 payload_len][i64 token][u8 opcode][payload]
//! Response: [i64 token][u8 status][u32 payload_len][payload]
//! ```

use crate::codec::FixedCodec;
use crate::error::{Error, Result as HeapResult};
use crate::storage::heap::{Compaction, HeapStats, Relocation, Segment};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size limit for a single frame payload
pub const MAX_MESSAGE_SIZE: u32 = 64 * 1024 * 1024; // 64 MB

/// Operation requested by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Allocate = 1,
    Free = 2,
    Write = 3,
    Read = 4,
    Defragment = 5,
    Stats = 6,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> HeapResult<Self> {
        match byte {
            1 => Ok(Opcode::Allocate),
            2 => Ok(Opcode::Free),
            3 => Ok(Opcode::Write),
            4 => Ok(Opcode::Read),
            5 => Ok(Opcode::Defragment),
            6 => Ok(Opcode::Stats),
            _ => Err(Error::InvalidArgument(format!("Unknown opcode: 0x{:02x}", byte))),
        }
    }
}

/// Outcome of a request, one per error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    InvalidArgument = 1,
    NotFound = 2,
    CapacityExceeded = 3,
    IoFailure = 4,
    Internal = 5,
}

impl Status {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Status::Ok),
            1 => Ok(Status::InvalidArgument),
            2 => Ok(Status::NotFound),
            3 => Ok(Status::CapacityExceeded),
            4 => Ok(Status::IoFailure),
            5 => Ok(Status::Internal),
            _ => Err(anyhow!("Unknown status: 0x{:02x}", byte)),
        }
    }

    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::InvalidArgument(_) | Error::Codec(_) => Status::InvalidArgument,
            Error::NotFound(_) => Status::NotFound,
            Error::CapacityExceeded(_) => Status::CapacityExceeded,
            Error::IoFailure(_) => Status::IoFailure,
            Error::Network(_) | Error::Config(_) => Status::Internal,
        }
    }

    /// Rebuild the error a remote peer reported
    pub fn into_error(self, message: String) -> Error {
        match self {
            Status::InvalidArgument => Error::InvalidArgument(message),
            Status::NotFound => Error::NotFound(message),
            Status::CapacityExceeded => Error::CapacityExceeded(message),
            Status::IoFailure => Error::IoFailure(message),
            Status::Ok | Status::Internal => Error::Network(message),
        }
    }
}

/// Decoded heap request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Allocate { size: u64 },
    Free { segment: Segment },
    Write { segment: Segment, data: Vec<u8> },
    Read { segment: Segment, count: u64 },
    Defragment,
    Stats,
}

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::Allocate { .. } => Opcode::Allocate,
            Request::Free { .. } => Opcode::Free,
            Request::Write { .. } => Opcode::Write,
            Request::Read { .. } => Opcode::Read,
            Request::Defragment => Opcode::Defragment,
            Request::Stats => Opcode::Stats,
        }
    }

    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Request::Allocate { size } => size.to_vec(),
            Request::Free { segment } => segment.to_vec(),
            Request::Write { segment, data } => {
                let mut payload = segment.to_vec();
                payload.extend_from_slice(data);
                payload
            }
            Request::Read { segment, count } => {
                let mut payload = segment.to_vec();
                payload.extend_from_slice(&count.to_vec());
                payload
            }
            Request::Defragment | Request::Stats => Vec::new(),
        }
    }

    /// Parse a request from its frame
    pub fn decode(frame: &RequestFrame) -> HeapResult<Self> {
        let payload = &frame.payload;
        let request = match Opcode::from_byte(frame.opcode)? {
            Opcode::Allocate => {
                expect_len(payload, u64::SIZE)?;
                Request::Allocate {
                    size: u64::decode(payload, 0)?,
                }
            }
            Opcode::Free => {
                expect_len(payload, Segment::SIZE)?;
                Request::Free {
                    segment: Segment::decode(payload, 0)?,
                }
            }
            Opcode::Write => Request::Write {
                segment: Segment::decode(payload, 0)?,
                data: payload[Segment::SIZE..].to_vec(),
            },
            Opcode::Read => {
                expect_len(payload, Segment::SIZE + u64::SIZE)?;
                Request::Read {
                    segment: Segment::decode(payload, 0)?,
                    count: u64::decode(payload, Segment::SIZE)?,
                }
            }
            Opcode::Defragment => Request::Defragment,
            Opcode::Stats => Request::Stats,
        };
        Ok(request)
    }
}

fn expect_len(payload: &[u8], len: usize) -> HeapResult<()> {
    if payload.len() != len {
        return Err(Error::InvalidArgument(format!(
            "Expected {} payload bytes, got {}",
            len,
            payload.len()
        )));
    }
    Ok(())
}

/// Encode a compaction report
///
/// `[u32 n][n × (from, to)][u8 has_tail][tail?][u64 moved_bytes]`
pub fn encode_compaction(compaction: &Compaction) -> Vec<u8> {
    let mut payload = (compaction.relocations.len() as u32).to_vec();
    for relocation in &compaction.relocations {
        payload.extend_from_slice(&relocation.from.to_vec());
        payload.extend_from_slice(&relocation.to.to_vec());
    }
    match compaction.free_tail {
        Some(tail) => {
            payload.push(1);
            payload.extend_from_slice(&tail.to_vec());
        }
        None => payload.push(0),
    }
    payload.extend_from_slice(&compaction.moved_bytes.to_vec());
    payload
}

pub fn decode_compaction(payload: &[u8]) -> HeapResult<Compaction> {
    let count = u32::decode(payload, 0)? as usize;
    let mut offset = u32::SIZE;

    let mut relocations = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let from = Segment::decode(payload, offset)?;
        let to = Segment::decode(payload, offset + Segment::SIZE)?;
        relocations.push(Relocation { from, to });
        offset += 2 * Segment::SIZE;
    }

    let free_tail = if bool::decode(payload, offset)? {
        offset += 1;
        let tail = Segment::decode(payload, offset)?;
        offset += Segment::SIZE;
        Some(tail)
    } else {
        offset += 1;
        None
    };
    let moved_bytes = u64::decode(payload, offset)?;

    Ok(Compaction {
        relocations,
        free_tail,
        moved_bytes,
    })
}

/// JSON body of a `Stats` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub heap: HeapStats,
    /// Prometheus text exposition of the server's registry
    pub metrics: String,
}

/// Raw request frame as read from the stream
#[derive(Debug, Clone)]
pub struct RequestFrame {
    pub token: i64,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

/// Response frame
#[derive(Debug, Clone)]
pub struct ResponseMessage {
    pub token: i64,
    pub status: Status,
    pub payload: Vec<u8>,
}

impl ResponseMessage {
    pub fn ok(token: i64, payload: Vec<u8>) -> Self {
        Self {
            token,
            status: Status::Ok,
            payload,
        }
    }

    pub fn error(token: i64, error: &Error) -> Self {
        Self {
            token,
            status: Status::from_error(error),
            payload: error.to_string().into_bytes(),
        }
    }
}

/// Read a request frame (server side)
///
/// Returns `None` when the peer closed the stream between frames.
pub async fn read_request<T>(stream: &mut T) -> Result<Option<RequestFrame>>
where
    T: AsyncRead + Unpin,
{
    let size = match stream.read_u32_le().await {
        Ok(size) => size,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if size > MAX_MESSAGE_SIZE {
        return Err(anyhow!(
            "Request too large: {} bytes (max: {})",
            size,
            MAX_MESSAGE_SIZE
        ));
    }

    let token = stream.read_i64_le().await?;
    let opcode = stream.read_u8().await?;

    let mut payload = vec![0u8; size as usize];
    stream.read_exact(&mut payload).await?;

    Ok(Some(RequestFrame {
        token,
        opcode,
        payload,
    }))
}

/// Write a request (client side)
pub async fn write_request<T>(stream: &mut T, token: i64, request: &Request) -> Result<()>
where
    T: AsyncWrite + Unpin,
{
    let payload = request.encode_payload();
    if payload.len() > MAX_MESSAGE_SIZE as usize {
        return Err(anyhow!("Request too large: {} bytes", payload.len()));
    }

    stream.write_u32_le(payload.len() as u32).await?;
    stream.write_i64_le(token).await?;
    stream.write_u8(request.opcode() as u8).await?;
    stream.write_all(&payload).await?;
    stream.flush().await?;

    Ok(())
}

/// Write a response (server side)
pub async fn write_response<T>(stream: &mut T, msg: &ResponseMessage) -> Result<()>
where
    T: AsyncWrite + Unpin,
{
    if msg.payload.len() > MAX_MESSAGE_SIZE as usize {
        return Err(anyhow!("Response too large: {} bytes", msg.payload.len()));
    }

    stream.write_i64_le(msg.token).await?;
    stream.write_u8(msg.status as u8).await?;
    stream.write_u32_le(msg.payload.len() as u32).await?;
    stream.write_all(&msg.payload).await?;
    stream.flush().await?;

    Ok(())
}

/// Read a response (client side)
pub async fn read_response<T>(stream: &mut T) -> Result<ResponseMessage>
where
    T: AsyncRead + Unpin,
{
    let token = stream.read_i64_le().await?;
    let status = Status::from_byte(stream.read_u8().await?)?;
    let size = stream.read_u32_le().await?;

    if size > MAX_MESSAGE_SIZE {
        return Err(anyhow!(
            "Response too large: {} bytes (max: {})",
            size,
            MAX_MESSAGE_SIZE
        ));
    }

    let mut payload = vec![0u8; size as usize];
    stream.read_exact(&mut payload).await?;

    Ok(ResponseMessage {
        token,
        status,
        payload,
    })
}
