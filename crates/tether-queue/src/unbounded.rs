//! Append-only queue with a read cursor.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::QueueStats;

/// A thread-safe FIFO that never refuses an item.
///
/// Items are appended to a `Vec` and handed out by advancing a cursor.
/// Dequeued items are moved out, but the backing storage is never shrunk,
/// so a long-lived queue grows for as long as it is written to. Use
/// [`BoundedQueue`](crate::BoundedQueue) for steady-state traffic.
pub struct UnboundedQueue<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    items: Vec<Option<T>>,
    cursor: usize,
}

impl<T> UnboundedQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: Vec::new(),
                cursor: 0,
            }),
        }
    }

    /// Appends `item`. Never fails.
    pub fn enqueue(&self, item: T) {
        self.lock().items.push(Some(item));
    }

    /// Removes and returns the oldest unread item, or `None` once the
    /// cursor has caught up with the end.
    pub fn dequeue(&self) -> Option<T> {
        let mut inner = self.lock();
        let cursor = inner.cursor;
        if cursor >= inner.items.len() {
            return None;
        }
        inner.cursor += 1;
        inner.items[cursor].take()
    }

    /// Number of unread items.
    pub fn len(&self) -> usize {
        let inner = self.lock();
        inner.items.len() - inner.cursor
    }

    /// `true` if every item has been read.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the cursors.
    pub fn stats(&self) -> QueueStats {
        let inner = self.lock();
        QueueStats {
            capacity: None,
            read: inner.cursor as u64,
            write: inner.items.len() as u64,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for UnboundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for UnboundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("UnboundedQueue")
            .field("read", &stats.read)
            .field("write", &stats.write)
            .finish()
    }
}
