//! Bounded Blocking Queue
//!
//! A fixed-capacity FIFO shared between one producer (the acceptor) and many
//! consumers (the workers). It is a ring buffer guarded by a single mutex, with
//! two condition variables:
//!
//! ```text
//!                  not_full                         not_empty
//!   acceptor ──── insert() ───▶ ┌───┬───┬───┬───┐ ──── retrieve() ───▶ worker
//!   (blocks while              │ h │   │   │ t │                     (blocks while
//!    count == capacity)         └───┴───┴───┴───┘                      count == 0)
//! ```
//!
//! Every wait re-checks its predicate in a loop, so spurious wakeups and
//! racing consumers are harmless. A full queue makes the producer wait; nothing
//! is ever dropped.
//!
//! Closing the queue wakes every waiter. After that `insert` hands the item
//! back, and `retrieve` returns whatever is still queued and then `None`.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::trace;

/// Returned by [`BoundedQueue::insert`] once the queue is closed.
///
/// Carries the rejected item back to the caller.
#[derive(Error)]
#[error("queue is closed")]
pub struct QueueClosed<T>(pub T);

impl<T> QueueClosed<T> {
    /// Returns the item that could not be inserted.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueClosed(..)")
    }
}

/// Ring buffer state; only touched with the queue mutex held.
struct RingBuffer<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    count: usize,
    closed: bool,
}

impl<T> RingBuffer<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            count: 0,
            closed: false,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    fn push(&mut self, item: T) {
        debug_assert!(self.count < self.capacity());
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.capacity();
        self.count += 1;
    }

    fn pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.count -= 1;
        item
    }
}

/// A fixed-capacity, blocking, multi-producer multi-consumer FIFO.
///
/// # Example
///
/// ```
/// use poolkv::queue::BoundedQueue;
/// use std::sync::Arc;
/// use std::thread;
///
/// let queue = Arc::new(BoundedQueue::new(4));
///
/// let consumer = {
///     let queue = Arc::clone(&queue);
///     thread::spawn(move || {
///         let mut seen = Vec::new();
///         while let Some(n) = queue.retrieve() {
///             seen.push(n);
///         }
///         seen
///     })
/// };
///
/// for n in 0..10 {
///     queue.insert(n).unwrap();
/// }
/// queue.close();
///
/// assert_eq!(consumer.join().unwrap(), (0..10).collect::<Vec<_>>());
/// ```
pub struct BoundedQueue<T> {
    state: Mutex<RingBuffer<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BoundedQueue")
            .field("capacity", &state.capacity())
            .field("len", &state.count)
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T> BoundedQueue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");

        Self {
            state: Mutex::new(RingBuffer::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RingBuffer<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `item` at the tail, blocking while the queue is full.
    ///
    /// Returns the item inside [`QueueClosed`] if the queue is (or becomes)
    /// closed before space is available.
    pub fn insert(&self, item: T) -> Result<(), QueueClosed<T>> {
        let mut state = self.lock();

        while state.is_full() && !state.closed {
            trace!(capacity = state.capacity(), "Queue full, producer waiting");
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if state.closed {
            return Err(QueueClosed(item));
        }

        state.push(item);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the item at the head, blocking while the queue is empty.
    ///
    /// Returns `None` only when the queue is closed and fully drained.
    pub fn retrieve(&self) -> Option<T> {
        let mut state = self.lock();

        while state.count == 0 && !state.closed {
            trace!("Queue empty, consumer waiting");
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let item = state.pop();
        drop(state);

        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Closes the queue and wakes every blocked producer and consumer.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Removes and returns every queued item in FIFO order.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.lock();
        let mut items = Vec::with_capacity(state.count);
        while let Some(item) = state.pop() {
            items.push(item);
        }
        drop(state);

        self.not_full.notify_all();
        items
    }

    /// Returns the number of queued items.
    pub fn len(&self) -> usize {
        self.lock().count
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
