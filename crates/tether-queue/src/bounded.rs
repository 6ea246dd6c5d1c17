//! Fixed-capacity ring buffer with fail-fast overflow.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{QueueError, QueueStats};

/// A thread-safe, fixed-capacity FIFO.
///
/// Slots are addressed by `cursor % capacity`. The read and write cursors
/// only grow, and `write - read <= capacity` holds at all times: an
/// enqueue that would break it is refused with [`QueueError::Overflow`]
/// and the unread slot it would have landed on is left untouched.
///
/// ```rust
/// use tether_queue::{BoundedQueue, QueueError};
///
/// let queue = BoundedQueue::new(4).unwrap();
/// for i in 0..4 {
///     queue.enqueue(i).unwrap();
/// }
/// assert!(matches!(queue.enqueue(4), Err(QueueError::Overflow { .. })));
/// assert_eq!(queue.dequeue(), Some(0));
/// ```
pub struct BoundedQueue<T> {
    ring: Mutex<Ring<T>>,
    capacity: usize,
}

struct Ring<T> {
    slots: Vec<Option<T>>,
    read: u64,
    write: u64,
}

impl<T> BoundedQueue<T> {
    /// Creates an empty queue with room for `capacity` items.
    ///
    /// # Errors
    /// [`QueueError::ZeroCapacity`] if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }

        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Ok(Self {
            ring: Mutex::new(Ring {
                slots,
                read: 0,
                write: 0,
            }),
            capacity,
        })
    }

    /// Appends `item` at the back of the queue.
    ///
    /// # Errors
    /// [`QueueError::Overflow`] if `capacity` items are already waiting.
    /// The item is dropped; the queue is unchanged.
    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        let mut ring = self.lock();

        if ring.write - ring.read >= self.capacity as u64 {
            return Err(QueueError::Overflow {
                capacity: self.capacity,
                read: ring.read,
                write: ring.write,
            });
        }

        let slot = self.slot(ring.write);
        ring.slots[slot] = Some(item);
        ring.write += 1;
        Ok(())
    }

    /// Removes and returns the item at the front, or `None` if empty.
    ///
    /// Never blocks.
    pub fn dequeue(&self) -> Option<T> {
        let mut ring = self.lock();

        if ring.read >= ring.write {
            return None;
        }

        let slot = self.slot(ring.read);
        let item = ring.slots[slot].take();
        ring.read += 1;
        item
    }

    /// Number of items waiting.
    pub fn len(&self) -> usize {
        let ring = self.lock();
        (ring.write - ring.read) as usize
    }

    /// `true` if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The fixed capacity chosen at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the cursors.
    pub fn stats(&self) -> QueueStats {
        let ring = self.lock();
        QueueStats {
            capacity: Some(self.capacity),
            read: ring.read,
            write: ring.write,
        }
    }

    fn slot(&self, cursor: u64) -> usize {
        (cursor % self.capacity as u64) as usize
    }

    // A panic while holding the lock can't leave the ring half-updated:
    // every mutation is a single slot write followed by a cursor bump.
    fn lock(&self) -> MutexGuard<'_, Ring<T>> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("read", &stats.read)
            .field("write", &stats.write)
            .finish()
    }
}
