//! Connection Queue Module
//!
//! The bounded, blocking FIFO that hands accepted connections from the
//! acceptor thread to the worker pool.
//!
//! ```text
//! ┌────────────┐  insert   ┌──────────────────┐  retrieve  ┌────────────┐
//! │  Acceptor  │──────────>│  BoundedQueue<T> │───────────>│  Worker N  │
//! └────────────┘           └──────────────────┘            └────────────┘
//! ```

pub mod bounded;

pub use bounded::{BoundedQueue, QueueClosed};
