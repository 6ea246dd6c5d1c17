//! Periodic background requests.
//!
//! Game-style clients poll the server for state on a fixed period while
//! the application keeps updating what it sends. An [`AutoUpdater`] owns
//! a [`Client`] and does exactly that on a background task:
//!
//! ```text
//!  set_message ──▶ watch ──▶ [tick] request(current) ──▶ responses
//!                                                          │
//!                                   try_next / drain ◀─────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tether_protocol::Message;
use tether_queue::UnboundedQueue;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{Client, TetherError};

/// Repeats a request on a timer and buffers the responses.
///
/// Responses pile up until consumed. Call [`drain`](Self::drain) or
/// [`try_next`](Self::try_next) regularly; the buffer never shrinks.
#[derive(Debug)]
pub struct AutoUpdater {
    outbound: watch::Sender<Message>,
    responses: Arc<UnboundedQueue<Message>>,
    stop: CancellationToken,
    worker: JoinHandle<Result<Client, TetherError>>,
}

impl AutoUpdater {
    /// Takes over `client` and starts issuing `initial` every `period`.
    ///
    /// The first request goes out immediately. If a request takes longer
    /// than `period`, the missed ticks are skipped rather than fired in a
    /// burst.
    pub fn spawn(client: Client, initial: Message, period: Duration) -> Self {
        let (outbound, current) = watch::channel(initial);
        let responses = Arc::new(UnboundedQueue::new());
        let stop = CancellationToken::new();

        let worker = tokio::spawn(update_loop(
            client,
            current,
            Arc::clone(&responses),
            stop.clone(),
            period,
        ));

        Self {
            outbound,
            responses,
            stop,
            worker,
        }
    }

    /// Replaces the message sent on every following tick.
    pub fn set_message(&self, message: Message) {
        self.outbound.send_replace(message);
    }

    /// Oldest unread response, if any.
    pub fn try_next(&self) -> Option<Message> {
        self.responses.dequeue()
    }

    /// Every unread response, oldest first.
    pub fn drain(&self) -> Vec<Message> {
        std::iter::from_fn(|| self.responses.dequeue()).collect()
    }

    /// Number of unread responses.
    pub fn pending(&self) -> usize {
        self.responses.len()
    }

    /// `false` once the worker has ended, by [`stop`](Self::stop) or by
    /// an error.
    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }

    /// Stops the timer, lets an in-flight request finish, and hands the
    /// client back.
    ///
    /// Responses still buffered are dropped; drain them first if needed.
    ///
    /// # Errors
    /// Whatever error ended the worker early, such as `Disconnected`.
    pub async fn stop(self) -> Result<Client, TetherError> {
        self.stop.cancel();
        self.worker.await?
    }
}

async fn update_loop(
    mut client: Client,
    current: watch::Receiver<Message>,
    responses: Arc<UnboundedQueue<Message>>,
    stop: CancellationToken,
    period: Duration,
) -> Result<Client, TetherError> {
    // `interval` panics on a zero period.
    let mut ticker = time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let message = current.borrow().clone();
        let response = client.request(&message).await?;
        responses.enqueue(response);
    }

    tracing::debug!(peer = %client.peer(), "auto-update stopped");
    Ok(client)
}
