//! Integration tests for the heap protocol server and client

use heapstore::error::Error;
use heapstore::network::{HeapClient, ProtocolServer, ServerConfig};
use heapstore::{Segment, SegmentAllocator};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

struct TestServer {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<anyhow::Result<()>>,
    heap: Arc<SegmentAllocator>,
}

/// Helper to start a test server on a random port
async fn start_test_server(name: &str, max_heap_size: u64) -> TestServer {
    let temp_dir = std::env::temp_dir().join(format!(
        "heapstore_net_{}_{}",
        name,
        std::process::id()
    ));
    std::fs::remove_dir_all(&temp_dir).ok();
    let heap = Arc::new(SegmentAllocator::new(&temp_dir, max_heap_size).unwrap());

    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        max_connections: 10,
    };
    let server = ProtocolServer::bind(config, heap.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (shutdown, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { server.serve(rx).await });

    TestServer {
        addr,
        shutdown,
        handle,
        heap,
    }
}

impl TestServer {
    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
        std::fs::remove_dir_all(self.heap.base_path()).ok();
    }
}

#[tokio::test]
async fn test_round_trip_over_tcp() {
    let server = start_test_server("round_trip", 1 << 20).await;
    let mut client = HeapClient::connect(server.addr, 3).await.unwrap();

    let segment = client.allocate(11).await.unwrap();
    assert_eq!(segment, Segment::new(0, 11));

    client.write(segment, b"hello world").await.unwrap();
    assert_eq!(client.read(segment, 11).await.unwrap(), b"hello world");
    assert_eq!(client.read(segment, 5).await.unwrap(), b"hello");

    // Server-side heap sees the same state
    assert!(server.heap.contains(segment));

    client.free(segment).await.unwrap();
    assert!(!server.heap.contains(segment));

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_errors_cross_the_wire() {
    let server = start_test_server("errors", 8192).await;
    let mut client = HeapClient::connect(server.addr, 3).await.unwrap();

    assert!(matches!(
        client.allocate(0).await,
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        client.free(Segment::new(64, 64)).await,
        Err(Error::NotFound(_))
    ));

    client.allocate(100).await.unwrap();
    assert!(matches!(
        client.allocate(5000).await,
        Err(Error::CapacityExceeded(_))
    ));

    // The connection survives error responses
    let segment = client.allocate(8).await.unwrap();
    assert!(matches!(
        client.read(segment, 9).await,
        Err(Error::InvalidArgument(_))
    ));

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_read_larger_than_a_frame_keeps_connection_usable() {
    let server = start_test_server("large_read", 128 * 1024 * 1024).await;
    let mut client = HeapClient::connect(server.addr, 3).await.unwrap();

    let big = client.allocate(70 * 1024 * 1024).await.unwrap();
    assert!(matches!(
        client.read(big, big.size).await,
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        client.read(big, u64::MAX).await,
        Err(Error::InvalidArgument(_))
    ));

    // Same connection, next request still lines up
    let report = client.stats().await.unwrap();
    assert_eq!(report.heap.used_segments, 1);
    assert_eq!(client.read(big, 16).await.unwrap(), vec![0u8; 16]);

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_defragment_and_stats() {
    let server = start_test_server("defragment", 1 << 20).await;
    let mut client = HeapClient::connect(server.addr, 3).await.unwrap();

    let a = client.allocate(50).await.unwrap();
    let b = client.allocate(50).await.unwrap();
    client.write(b, b"moved").await.unwrap();
    client.free(a).await.unwrap();

    let compaction = client.defragment().await.unwrap();
    let moved = compaction.resolve(b);
    assert_eq!(moved, Segment::new(0, 50));
    assert_eq!(compaction.moved_bytes, 50);
    assert_eq!(client.read(moved, 5).await.unwrap(), b"moved");

    let report = client.stats().await.unwrap();
    assert_eq!(report.heap.used_segments, 1);
    assert_eq!(report.heap.used_bytes, 50);
    assert_eq!(report.heap.free_segments, 1);
    assert_eq!(report.heap.fragmentation(), 0.0);

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_clients() {
    let server = start_test_server("concurrent", 1 << 22).await;

    let tasks: Vec<_> = (0..4u8)
        .map(|id| {
            let addr = server.addr;
            tokio::spawn(async move {
                let mut client = HeapClient::connect(addr, 3).await.unwrap();
                for round in 0..20u8 {
                    let data = vec![id.wrapping_mul(31).wrapping_add(round); 64];
                    let segment = client.allocate(64).await.unwrap();
                    client.write(segment, &data).await.unwrap();
                    assert_eq!(client.read(segment, 64).await.unwrap(), data);
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(server.heap.used_segments().len(), 80);

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_opcode_gets_error_response() {
    let server = start_test_server("opcode", 1 << 20).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    // [len=0][token=9][opcode=0x7f]
    stream.write_u32_le(0).await.unwrap();
    stream.write_i64_le(9).await.unwrap();
    stream.write_u8(0x7f).await.unwrap();
    stream.flush().await.unwrap();

    let token = stream.read_i64_le().await.unwrap();
    let status = stream.read_u8().await.unwrap();
    let len = stream.read_u32_le().await.unwrap();
    let mut message = vec![0u8; len as usize];
    stream.read_exact(&mut message).await.unwrap();

    assert_eq!(token, 9);
    assert_eq!(status, 1);
    assert!(String::from_utf8(message).unwrap().contains("opcode"));

    drop(stream);
    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_idle_connections() {
    let server = start_test_server("shutdown", 1 << 20).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    // Let the server pick the connection up before signalling
    tokio::time::sleep(Duration::from_millis(100)).await;
    server.stop().await;

    let mut buf = [0u8; 1];
    let read = timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("connection should close");
    assert!(matches!(read, Ok(0) | Err(_)));
}
