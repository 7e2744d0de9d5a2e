//! heapstore Server Binary
//!
//! Command-line interface for the persistent segment heap:
//! - Serve a heap file over TCP
//! - Issue heap operations against a running server
//! - Print the effective configuration
//!
//! # Examples
//!
//! ```bash
//! # Start server
//! heapstore --data-dir /var/lib/heapstore serve --port 28100
//!
//! # Allocate 64 bytes and write into them
//! heapstore client alloc 64
//! heapstore client write --pointer 0 --size 64 "hello"
//!
//! # Compact the heap
//! heapstore client compact
//! ```

use clap::{Args, Parser, Subcommand};
use heapstore::config::Settings;
use heapstore::network::{HeapClient, ProtocolServer, ServerConfig};
use heapstore::{Segment, SegmentAllocator};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// heapstore - persistent segment heap
#[derive(Parser, Debug)]
#[command(name = "heapstore")]
#[command(version = heapstore::VERSION)]
#[command(about = "heapstore - file-backed segment heap with compaction", long_about = None)]
#[command(author = "Anton Feldmann <anton.feldmann@gmail.com>")]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(long, global = true, env = "HEAPSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory path
    #[arg(long, global = true, env = "HEAPSTORE_DATA")]
    data_dir: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, env = "HEAPSTORE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the heap over TCP
    Serve(ServeArgs),

    /// Send operations to a running server
    Client {
        /// Server address (defaults to the configured bind address)
        #[arg(long, env = "HEAPSTORE_ADDR")]
        addr: Option<SocketAddr>,

        /// Connection attempts while the server refuses
        #[arg(long, default_value = "3")]
        attempts: usize,

        #[command(subcommand)]
        command: ClientCommands,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Show version
    Version,
}

/// Server arguments
#[derive(Args, Debug)]
struct ServeArgs {
    /// Bind address
    #[arg(short, long, env = "HEAPSTORE_BIND")]
    bind: Option<String>,

    /// TCP port
    #[arg(short, long, env = "HEAPSTORE_PORT")]
    port: Option<u16>,

    /// Maximum heap size in bytes
    #[arg(long)]
    max_heap_size: Option<u64>,

    /// Maximum concurrent connections
    #[arg(long)]
    max_connections: Option<usize>,
}

/// A segment handle on the command line
#[derive(Args, Debug)]
struct SegmentArgs {
    /// Byte offset of the segment
    #[arg(long)]
    pointer: u64,

    /// Length of the segment
    #[arg(long)]
    size: u64,
}

impl SegmentArgs {
    fn segment(&self) -> Segment {
        Segment::new(self.pointer, self.size)
    }
}

#[derive(Subcommand, Debug)]
enum ClientCommands {
    /// Allocate a segment
    Alloc {
        /// Size in bytes
        size: u64,
    },

    /// Free a segment
    Free(SegmentArgs),

    /// Write UTF-8 text to the start of a segment
    Write {
        #[command(flatten)]
        segment: SegmentArgs,

        /// Text to write
        data: String,
    },

    /// Read bytes from the start of a segment
    Read {
        #[command(flatten)]
        segment: SegmentArgs,

        /// Number of bytes (defaults to the segment size)
        #[arg(long)]
        count: Option<u64>,
    },

    /// Compact the heap and print the relocations
    Compact,

    /// Print heap statistics and metrics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    apply_overrides(&cli, &mut settings);

    setup_logging(&settings, cli.no_color)?;

    match cli.command {
        Commands::Serve(_) => serve_command(settings).await,
        Commands::Client {
            addr,
            attempts,
            command,
        } => client_command(&settings, addr, attempts, command).await,
        Commands::Config => {
            print!("{}", settings.to_toml()?);
            Ok(())
        }
        Commands::Version => {
            println!("heapstore {}", heapstore::VERSION);
            Ok(())
        }
    }
}

/// Command line flags win over file and environment settings
fn apply_overrides(cli: &Cli, settings: &mut Settings) {
    if let Some(data_dir) = &cli.data_dir {
        settings.heap.data_dir = data_dir.clone();
    }
    if let Some(log_dir) = &cli.log_dir {
        settings.logging.dir = log_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        settings.logging.level = level.clone();
    }
    if let Commands::Serve(args) = &cli.command {
        if let Some(bind) = &args.bind {
            settings.server.bind = bind.clone();
        }
        if let Some(port) = args.port {
            settings.server.port = port;
        }
        if let Some(max_heap_size) = args.max_heap_size {
            settings.heap.max_heap_size = max_heap_size;
        }
        if let Some(max_connections) = args.max_connections {
            settings.server.max_connections = max_connections;
        }
    }
}

/// Setup logging with rolling files and console output
fn setup_logging(settings: &Settings, no_color: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(&settings.logging.dir)?;

    let file_appender =
        RollingFileAppender::new(Rotation::DAILY, &settings.logging.dir, "heapstore.log");

    let log_level = settings
        .logging
        .level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!no_color)
                .pretty(),
        )
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

/// Serve command - open the heap and run the protocol server until Ctrl-C
async fn serve_command(settings: Settings) -> anyhow::Result<()> {
    info!(version = %heapstore::VERSION, "heapstore starting");
    heapstore::metrics::init_metrics();

    let heap = Arc::new(SegmentAllocator::with_options(
        &settings.heap.data_dir,
        settings.heap.options(),
    )?);
    info!(
        path = %settings.heap.data_dir.display(),
        heap_size = heap.current_heap_size(),
        max_heap_size = heap.max_heap_size(),
        "Heap opened"
    );

    let server_config = ServerConfig::from_settings(&settings.server)?;
    let server = ProtocolServer::bind(server_config, heap.clone()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutdown requested");
        shutdown_tx.send(true).ok();
    });

    server.serve(shutdown_rx).await?;

    heap.flush()?;
    let stats = heap.stats();
    info!(
        used_segments = stats.used_segments,
        used_bytes = stats.used_bytes,
        free_segments = stats.free_segments,
        "heapstore stopped"
    );
    Ok(())
}

/// Client command - one request per invocation
async fn client_command(
    settings: &Settings,
    addr: Option<SocketAddr>,
    attempts: usize,
    command: ClientCommands,
) -> anyhow::Result<()> {
    let addr = match addr {
        Some(addr) => addr,
        None => settings.server.socket_addr()?,
    };
    let mut client = HeapClient::connect(addr, attempts).await?;

    match command {
        ClientCommands::Alloc { size } => {
            let segment = client.allocate(size).await?;
            println!("{}", serde_json::to_string(&segment)?);
        }
        ClientCommands::Free(args) => {
            client.free(args.segment()).await?;
            println!("Freed {}", args.segment());
        }
        ClientCommands::Write { segment, data } => {
            client.write(segment.segment(), data.as_bytes()).await?;
            println!("Wrote {} bytes to {}", data.len(), segment.segment());
        }
        ClientCommands::Read { segment, count } => {
            let count = count.unwrap_or(segment.size);
            let bytes = client.read(segment.segment(), count).await?;
            println!("{}", String::from_utf8_lossy(&bytes));
        }
        ClientCommands::Compact => {
            let compaction = client.defragment().await?;
            println!("{}", serde_json::to_string_pretty(&compaction)?);
        }
        ClientCommands::Stats => {
            let report = client.stats().await?;
            println!("{}", serde_json::to_string_pretty(&report.heap)?);
            println!("fragmentation: {:.3}", report.heap.fragmentation());
            print!("{}", report.metrics);
        }
    }

    Ok(())
}
