//! Network protocol handling
//!
//! Exposes a [`SegmentAllocator`](crate::storage::heap::SegmentAllocator)
//! over TCP with a small binary request/response protocol.
//!
//! ## Protocol Flow
//!
//! 1. **Connect**: Client opens a TCP connection (retrying while refused)
//! 2. **Request/Response Loop**: Client sends a tokened request frame, server
//!    answers with a frame carrying the same token and a status byte
//! 3. **Shutdown**: Server stops accepting and closes idle connections when
//!    its shutdown channel fires
//!
//! ## Operations
//!
//! - Allocate, Free, Write, Read on segment handles
//! - Defragment, answered with the relocation report
//! - Stats, answered as JSON with heap statistics and Prometheus metrics

pub mod client;
pub mod connection;
pub mod protocol;
pub mod server;

pub use client::HeapClient;
pub use connection::ConnectionHandler;
pub use protocol::{
    Opcode, Request, RequestFrame, ResponseMessage, StatsReport, Status, MAX_MESSAGE_SIZE,
};
pub use server::{ProtocolServer, ServerConfig};
