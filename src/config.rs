//! Server sizing and operational configuration.

use crate::protocol::DEFAULT_MAX_FRAME_LEN;
use thiserror::Error;

/// Bind to every IPv4 interface by default.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Number of worker threads serving sessions.
pub const DEFAULT_WORKERS: usize = 8;

/// Connections that may wait for a free worker before the acceptor blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Rejected configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("maximum frame length must be at least 1")]
    ZeroFrameLimit,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on (0 picks a free port)
    pub port: u16,
    /// Fixed number of worker threads
    pub workers: usize,
    /// Capacity of the pending-connection queue
    pub queue_capacity: usize,
    /// Largest accepted frame payload, in bytes
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 0,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ServerConfig {
    /// Default configuration listening on `port`.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checks that every size is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.max_frame_len == 0 {
            return Err(ConfigError::ZeroFrameLimit);
        }
        Ok(())
    }
}
