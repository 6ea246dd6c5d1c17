//! The inbound queue shared by every receive worker and the dispatcher.

use tether_protocol::{Address, Message};
use tether_queue::{BoundedQueue, QueueError, QueueStats};
use tokio::sync::Notify;

/// One entry in the inbound queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A decoded request from `from`.
    Message { from: Address, message: Message },
    /// `from` has gone away. Dispatching this removes it from the
    /// connection table; the handler never sees it.
    Disconnected { from: Address },
}

impl Inbound {
    /// The connection this entry came from.
    pub fn from(&self) -> &Address {
        match self {
            Self::Message { from, .. } | Self::Disconnected { from } => from,
        }
    }
}

/// A [`BoundedQueue`] plus a wakeup for the consumer.
///
/// `push` stores a permit even when nobody is waiting, so a dispatcher
/// that checks the queue and then waits can't miss an item that landed
/// between the two.
#[derive(Debug)]
pub(crate) struct Inbox {
    queue: BoundedQueue<Inbound>,
    ready: Notify,
}

impl Inbox {
    pub(crate) fn new(capacity: usize) -> Result<Self, QueueError> {
        Ok(Self {
            queue: BoundedQueue::new(capacity)?,
            ready: Notify::new(),
        })
    }

    pub(crate) fn push(&self, item: Inbound) -> Result<(), QueueError> {
        self.queue.enqueue(item)?;
        self.ready.notify_one();
        Ok(())
    }

    pub(crate) fn pop(&self) -> Option<Inbound> {
        self.queue.dequeue()
    }

    /// Resolves after the next `push`, or immediately if one happened
    /// since the last wait.
    pub(crate) async fn ready(&self) {
        self.ready.notified().await;
    }

    pub(crate) fn stats(&self) -> QueueStats {
        self.queue.stats()
    }
}
