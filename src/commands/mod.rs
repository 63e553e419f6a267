//! Command Handler Module
//!
//! This module implements the dispatch layer for poolkv.
//! It receives request payloads read by a worker, parses them into commands,
//! executes them against the storage engine, and decides the response.
//!
//! ## Architecture
//!
//! ```text
//! Request payload
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Tokenizer +    │  (protocol module)
//! │  Command::parse │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;

pub use handler::{
    CloseReason, CommandHandler, Reply, RESPONSE_ENTRY_EXISTS, RESPONSE_NO_SUCH_ENTRY,
    RESPONSE_OK,
};
