//! TCP server for the heap protocol

use super::connection::ConnectionHandler;
use crate::config::ServerSettings;
use crate::storage::heap::SegmentAllocator;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 28100)),
            max_connections: 256,
        }
    }
}

impl ServerConfig {
    pub fn from_settings(settings: &ServerSettings) -> crate::error::Result<Self> {
        Ok(Self {
            bind_addr: settings.socket_addr()?,
            max_connections: settings.max_connections,
        })
    }
}

/// Heap protocol server
pub struct ProtocolServer {
    config: ServerConfig,
    listener: TcpListener,
    handler: Arc<ConnectionHandler>,
    connection_semaphore: Arc<Semaphore>,
}

impl ProtocolServer {
    /// Bind the listener; port 0 picks a free port
    pub async fn bind(config: ServerConfig, heap: Arc<SegmentAllocator>) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let handler = Arc::new(ConnectionHandler::new(heap));
        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));

        Ok(Self {
            config,
            listener,
            handler,
            connection_semaphore,
        })
    }

    /// Accept connections until `shutdown` flips to true or its sender drops
    pub async fn serve(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            "heapstore protocol server listening on {}",
            self.local_addr()?
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                _ = shutdown.changed() => break,
                permit = self.connection_semaphore.clone().acquire_owned() => permit?,
            };

            let accepted = tokio::select! {
                _ = shutdown.changed() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    let handler = self.handler.clone();
                    let shutdown = shutdown.clone();

                    tokio::spawn(async move {
                        tracing::debug!("Accepted connection from {}", addr);

                        if let Err(e) = handler.handle(stream, shutdown).await {
                            tracing::error!("Connection error from {}: {}", addr, e);
                        }

                        drop(permit);
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                }
            }
        }

        tracing::info!("heapstore protocol server stopped");
        Ok(())
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn max_connections(&self) -> usize {
        self.config.max_connections
    }

    /// Get available connection slots
    pub fn available_connections(&self) -> usize {
        self.connection_semaphore.available_permits()
    }
}
