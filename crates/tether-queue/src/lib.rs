//! Thread-safe FIFO queues for Tether.
//!
//! Two flavours:
//!
//! - [`BoundedQueue`]: a fixed-capacity ring buffer. A full queue is an
//!   error, never a silent drop and never a blocking wait. The server uses
//!   it for inbound messages, so a dispatch worker that falls behind shows
//!   up as an overflow instead of lost data.
//! - [`UnboundedQueue`]: an append-only list with a read cursor. It never
//!   fails and never gives memory back, so it is only meant for short-lived
//!   use such as a client's background response buffer.
//!
//! Both are poll-style: `dequeue` returns `None` immediately when there is
//! nothing to read, so a consumer loop can also watch for shutdown.
//!
//! Each queue guards its state with a single `std::sync::Mutex`, held only
//! for the slot read or write. No method is `async`; the queues are safe to
//! call from Tokio tasks and plain threads alike.

mod bounded;
mod error;
mod unbounded;

pub use bounded::BoundedQueue;
pub use error::QueueError;
pub use unbounded::UnboundedQueue;

/// A snapshot of a queue's cursors.
///
/// Cursors only ever grow. `write - read` is the number of items waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Fixed capacity, or `None` for an unbounded queue.
    pub capacity: Option<usize>,
    /// Total items dequeued so far.
    pub read: u64,
    /// Total items enqueued so far.
    pub write: u64,
}

impl QueueStats {
    /// Items enqueued but not yet dequeued.
    pub fn pending(&self) -> u64 {
        self.write - self.read
    }
}
