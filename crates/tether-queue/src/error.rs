/// Errors raised by the bounded queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// A bounded queue needs at least one slot.
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    /// The queue already holds `capacity` unread items.
    ///
    /// This is a capacity error, not a transient condition: the consumer
    /// has fallen behind and the caller must not retry.
    #[error("queue overflow: {capacity} slots full (read cursor {read}, write cursor {write})")]
    Overflow { capacity: usize, read: u64, write: u64 },
}
