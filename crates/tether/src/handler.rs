//! Request handling hook.
//!
//! Tether doesn't decide what a request means. That's your job. The
//! server decodes each frame into a [`Message`], queues it, and hands it to
//! your [`Handler`] on a single dispatch worker, in arrival order.

use std::future::Future;

use tether_protocol::{Address, Message};

use crate::{ConnectionTable, HandlerError};

/// Application logic for a [`Server`](crate::Server).
///
/// # Trait bounds
///
/// - `Send + Sync` → the handler lives behind an `Arc` shared by the
///   dispatch worker and [`Server::flush`](crate::Server::flush).
/// - `'static` → it lives as long as the server.
///
/// # Replying
///
/// The server never replies on its own. To answer, send through the
/// table: `table.send_to(&from, &reply).await`. Replies to other clients
/// and broadcasts via `send_all` work the same way.
///
/// # Blocking
///
/// There is one dispatch worker. A handler that never returns stalls
/// every client, and the inbound queue eventually overflows.
///
/// # Example
///
/// ```rust
/// use tether::prelude::*;
///
/// /// Sends every request straight back.
/// struct Echo;
///
/// impl Handler for Echo {
///     async fn handle(
///         &self,
///         table: &ConnectionTable,
///         from: Address,
///         message: Message,
///     ) -> Result<(), HandlerError> {
///         if table.send_to(&from, &message).await {
///             Ok(())
///         } else {
///             Err(HandlerError::Undelivered(from))
///         }
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Handles one request from `from`.
    ///
    /// # Returns
    /// - `Ok(())`: handled (whether or not a reply was sent)
    /// - `Err(_)`: logged at `warn`; dispatch carries on with the next
    ///   request
    fn handle(
        &self,
        table: &ConnectionTable,
        from: Address,
        message: Message,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send;
}
