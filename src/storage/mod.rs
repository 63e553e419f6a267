//! Storage Engine Module
//!
//! This module provides the shared key-value store for poolkv.
//! It is a thread-safe, sharded map from `i32` keys to byte-string values,
//! touched concurrently by every worker thread.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲            ▲            ▲            ▲
//!        │            │            │            │
//!    worker 0     worker 1     worker 2  ...  worker N
//! ```
//!
//! ## Example
//!
//! ```
//! use poolkv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.create(1, Bytes::from("hello world")).unwrap();
//! assert_eq!(engine.read(1).unwrap(), Bytes::from("hello world"));
//! ```

pub mod engine;

pub use engine::{StorageEngine, StorageStats, StoreError, StoreResult};
