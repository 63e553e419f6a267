//! # PoolKV - A Thread-Pool In-Memory Key-Value Server
//!
//! PoolKV serves a small key-value protocol over TCP. Keys are 32-bit signed
//! integers, values are arbitrary byte strings, and every message on the wire
//! is a length-prefixed frame.
//!
//! ## Features
//!
//! - **Bounded Hand-Off**: One acceptor thread feeds a fixed-capacity queue
//!   drained by a fixed pool of worker threads
//! - **Backpressure**: When every worker is busy and the queue is full, the
//!   acceptor blocks and new clients wait in the listen backlog
//! - **Sharded Storage**: 64 independent `RwLock`s, so sessions touching
//!   different keys never contend
//! - **Binary-Safe Values**: Values may contain spaces, newlines or NUL bytes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               PoolKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────┐                 │
//! │  │  Acceptor   │───>│ BoundedQueue │───>│ WorkerPool  │                 │
//! │  │  (thread)   │    │  Mutex+Cond  │    │ (N threads) │                 │
//! │  └─────────────┘    └──────────────┘    └──────┬──────┘                 │
//! │                                                │ one session each       │
//! │                                                ▼                        │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ FrameCodec  │───>│  Tokenizer  │───>│  Command    │                  │
//! │  │ (11B header)│    │ (≤4 tokens) │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                     ┌──────────────────────────────────────────────┐    │
//! │                     │              StorageEngine                   │    │
//! │                     │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │    │
//! │                     │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │    │
//! │                     │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │    │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │    │
//! │                     └──────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use poolkv::{Server, ServerConfig};
//!
//! let config = ServerConfig::new(9000).with_workers(4);
//! let handle = Server::bind(config).unwrap().start().unwrap();
//!
//! // ... serve until it is time to stop ...
//!
//! handle.shutdown();
//! ```
//!
//! ## Supported Commands
//!
//! - `create <key> <len> <value>` - insert a new key
//! - `read <key>` - return the stored value
//! - `update <key> <len> <value>` - replace an existing value
//! - `delete <key>` - remove a key
//! - `exit00` - end the session
//!
//! ## Module Overview
//!
//! - [`protocol`]: Frame codec, tokenizer and command parsing
//! - [`storage`]: Thread-safe sharded storage engine
//! - [`commands`]: Command dispatch and response bytes
//! - [`queue`]: Bounded blocking queue between acceptor and workers
//! - [`connection`]: Client sessions and the open-connection registry
//! - [`server`]: Acceptor, worker pool and shutdown
//! - [`config`]: Server sizing

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod queue;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::{ConfigError, ServerConfig};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Command, FrameCodec, FrameError};
pub use queue::BoundedQueue;
pub use server::{Server, ServerError, ServerHandle, ShutdownReport};
pub use storage::{StorageEngine, StoreError};

/// Version of PoolKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
