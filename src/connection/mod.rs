//! Connection Module
//!
//! This module owns everything about a single client connection: the handle
//! that moves from acceptor to worker, the registry of open connections used
//! at shutdown, and the session loop a worker runs for each connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Acceptor thread                         │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept() + ConnectionRegistry::register()
//!                        ▼
//!           ┌────────────────────────┐
//!           │  BoundedQueue<Conn>    │
//!           └────────────┬───────────┘
//!                        │ retrieve()
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler (on a worker)             │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read frame  │───>│ Execute cmd │───>│ Write frame │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod handler;
pub mod registry;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, SessionEnd,
};
pub use registry::{Connection, ConnectionId, ConnectionRegistry};
