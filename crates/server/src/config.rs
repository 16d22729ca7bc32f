//! Chat server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::delivery::Hub;
use crate::directory::{Directory, SqliteDirectory};
use crate::presence::PresenceRegistry;
use crate::store::MessageStore;

/// Default history page size, also the hard cap for `limit` parameters
pub const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;
/// Events queued per connection before new ones are dropped
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Configuration for the Chatline server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Root directory for all persistent data
    pub data_dir: PathBuf,
    /// Conversation files
    pub storage_dir: PathBuf,
    /// Identity and group database
    pub database_path: PathBuf,
    /// HTTP / WebSocket listen address
    pub bind_addr: SocketAddr,
    /// Messages per history page
    pub page_size: usize,
    /// Per-connection outbound queue capacity
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::with_base_dir("chatline_data")
    }
}

impl ServerConfig {
    /// Create config with custom base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let data_dir = base_dir.into();
        Self {
            storage_dir: data_dir.join("conversations"),
            database_path: data_dir.join("directory.sqlite"),
            data_dir,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            page_size: DEFAULT_PAGE_SIZE,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }

    /// Reads `CHATLINE_ROOT`, `CHATLINE_ADDR`, `CHATLINE_PAGE_SIZE` and
    /// `CHATLINE_OUTBOUND_BUFFER`.
    pub fn from_env() -> Self {
        let mut config = std::env::var("CHATLINE_ROOT")
            .map(Self::with_base_dir)
            .unwrap_or_default();

        if let Some(addr) = std::env::var("CHATLINE_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.bind_addr = addr;
        }
        if let Some(size) = std::env::var("CHATLINE_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.page_size = size.clamp(1, MAX_PAGE_SIZE);
        }
        if let Some(buffer) = std::env::var("CHATLINE_OUTBOUND_BUFFER")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.outbound_buffer = buffer.max(1);
        }
        config
    }

    /// Clamps a caller-supplied limit into `1..=page_size`.
    pub fn page_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.page_size)
            .clamp(1, self.page_size.max(1))
    }

    /// Ensure all directories exist
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        Ok(())
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub registry: Arc<PresenceRegistry>,
    pub directory: Arc<dyn Directory>,
    pub store: Arc<MessageStore>,
    pub hub: Arc<Hub>,
}

impl AppState {
    /// Opens the SQLite directory and the conversation store under `config.data_dir`.
    pub async fn open(config: ServerConfig) -> anyhow::Result<Self> {
        config.ensure_dirs().await?;
        let directory = Arc::new(SqliteDirectory::open(&config.database_path).await?);
        Self::with_directory(config, directory).await
    }

    /// Wires the core around an existing directory.
    pub async fn with_directory(
        config: ServerConfig,
        directory: Arc<dyn Directory>,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(PresenceRegistry::new());
        let store = Arc::new(MessageStore::new(config.clone()).await?);
        let hub = Arc::new(Hub::new(registry.clone(), directory.clone(), store.clone()));
        Ok(Self {
            config,
            registry,
            directory,
            store,
            hub,
        })
    }
}
