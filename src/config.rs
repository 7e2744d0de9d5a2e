//! Layered configuration
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config heapstore.toml`)
//! 3. Environment variables with the `HEAPSTORE__` prefix, e.g.
//!    `HEAPSTORE__HEAP__MAX_HEAP_SIZE=1048576` or `HEAPSTORE__SERVER__PORT=7000`
//!
//! Command line flags are applied on top by the binary.

use crate::error::{Error, Result};
use crate::storage::heap::{HeapOptions, DEFAULT_INITIAL_HEAP_SIZE, HEAP_FILE_NAME};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "HEAPSTORE";

/// Complete runtime settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub heap: HeapConfig,
    pub server: ServerSettings,
    pub logging: LoggingConfig,
}

/// Heap file placement and sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Directory holding the heap file
    pub data_dir: PathBuf,
    /// Backing file name inside `data_dir`
    pub file_name: String,
    /// Size of the heap when opened
    pub initial_heap_size: u64,
    /// Hard ceiling for heap growth
    pub max_heap_size: u64,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/heapstore"),
            file_name: HEAP_FILE_NAME.to_string(),
            initial_heap_size: DEFAULT_INITIAL_HEAP_SIZE,
            max_heap_size: 64 * 1024 * 1024,
        }
    }
}

impl HeapConfig {
    pub fn options(&self) -> HeapOptions {
        HeapOptions {
            initial_heap_size: self.initial_heap_size,
            max_heap_size: self.max_heap_size,
            file_name: self.file_name.clone(),
        }
    }
}

/// Protocol server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
    pub max_connections: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 28100,
            max_connections: 256,
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address {}:{}: {}", self.bind, self.port, e)))
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Directory for rolling log files
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: PathBuf::from("logs"),
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .map_err(|e| Error::Config(format!("Failed to load settings: {}", e)))
    }

    /// Render settings as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to render settings: {}", e)))
    }
}
