//! Thread-Safe Storage Engine
//!
//! This module implements the shared key-value store that every worker thread
//! mutates. Keys are signed 32-bit integers and values are opaque byte strings.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Keys are spread over independent shards, so operations
//!    on keys in different shards never wait on each other.
//! 2. **RwLock per shard**: Concurrent `read`s share a shard; mutations are exclusive.
//! 3. **Whole-value replacement**: Values are `Bytes` and are swapped, never edited
//!    in place, so a reader always sees either the old or the new value.
//! 4. **No empty values**: An empty value is indistinguishable from "no value",
//!    so the engine never stores one.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A key always lands in the same shard, which gives every key a total order of
//! operations. No lock is ever held while doing socket I/O; callers receive a
//! cloned `Bytes` handle and write it out after the guard is released.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// Precondition failures reported by store operations.
///
/// These are recoverable: the dispatcher turns them into a textual response
/// and the session carries on.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// `create` on a key that already holds a value
    #[error("entry exists")]
    EntryExists,

    /// `read`, `update` or `delete` on a key without a value
    #[error("no such entry")]
    NoSuchEntry,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A single shard containing a portion of the entries.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<i32, Bytes>>,
}

impl Shard {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<i32, Bytes>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<i32, Bytes>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A point-in-time snapshot of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub creates: u64,
    pub reads: u64,
    pub updates: u64,
    pub deletes: u64,
    /// Operations rejected with a [`StoreError`]
    pub rejected: u64,
}

/// The key-value store shared by all worker threads.
///
/// Wrap it in an `Arc` and hand a clone to each worker. All operations take
/// `&self` and are safe to call concurrently.
///
/// # Example
///
/// ```
/// use poolkv::storage::{StorageEngine, StoreError};
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// engine.create(5, Bytes::from("abc")).unwrap();
/// assert_eq!(engine.read(5), Ok(Bytes::from("abc")));
///
/// assert_eq!(engine.create(5, Bytes::from("xyz")), Err(StoreError::EntryExists));
///
/// engine.update(5, Bytes::from("xyz")).unwrap();
/// engine.delete(5).unwrap();
/// assert_eq!(engine.read(5), Err(StoreError::NoSuchEntry));
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,

    key_count: AtomicU64,
    create_count: AtomicU64,
    read_count: AtomicU64,
    update_count: AtomicU64,
    delete_count: AtomicU64,
    rejected_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an empty storage engine.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            key_count: AtomicU64::new(0),
            create_count: AtomicU64::new(0),
            read_count: AtomicU64::new(0),
            update_count: AtomicU64::new(0),
            delete_count: AtomicU64::new(0),
            rejected_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: i32) -> usize {
        (key as u32 as usize) % NUM_SHARDS
    }

    #[inline]
    fn get_shard(&self, key: i32) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    fn reject<T>(&self, err: StoreError) -> StoreResult<T> {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
        Err(err)
    }

    /// Stores `value` at `key` if the key has no value yet.
    ///
    /// An empty `value` passes the precondition but leaves the key without a
    /// value.
    pub fn create(&self, key: i32, value: Bytes) -> StoreResult<()> {
        self.create_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.get_shard(key).write();
        if data.contains_key(&key) {
            drop(data);
            return self.reject(StoreError::EntryExists);
        }

        if !value.is_empty() {
            data.insert(key, value);
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Returns the value stored at `key`.
    ///
    /// Never inserts anything, even for a missing key.
    pub fn read(&self, key: i32) -> StoreResult<Bytes> {
        self.read_count.fetch_add(1, Ordering::Relaxed);

        let value = self.get_shard(key).read().get(&key).cloned();
        match value {
            Some(value) => Ok(value),
            None => self.reject(StoreError::NoSuchEntry),
        }
    }

    /// Replaces the value at `key` wholesale.
    ///
    /// Replacing with an empty value removes the entry.
    pub fn update(&self, key: i32, value: Bytes) -> StoreResult<()> {
        self.update_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.get_shard(key).write();
        if !data.contains_key(&key) {
            drop(data);
            return self.reject(StoreError::NoSuchEntry);
        }

        if value.is_empty() {
            data.remove(&key);
            self.key_count.fetch_sub(1, Ordering::Relaxed);
        } else {
            data.insert(key, value);
        }
        Ok(())
    }

    /// Removes the entry at `key`.
    pub fn delete(&self, key: i32) -> StoreResult<()> {
        self.delete_count.fetch_add(1, Ordering::Relaxed);

        let removed = self.get_shard(key).write().remove(&key);
        match removed {
            Some(_) => {
                self.key_count.fetch_sub(1, Ordering::Relaxed);
                Ok(())
            }
            None => self.reject(StoreError::NoSuchEntry),
        }
    }

    /// Returns the number of keys holding a value.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if no key holds a value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the engine counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            creates: self.create_count.load(Ordering::Relaxed),
            reads: self.read_count.load(Ordering::Relaxed),
            updates: self.update_count.load(Ordering::Relaxed),
            deletes: self.delete_count.load(Ordering::Relaxed),
            rejected: self.rejected_count.load(Ordering::Relaxed),
        }
    }
}
