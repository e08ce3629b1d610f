//! Seams to the external presence service.
//!
//! The session is generic over these traits so that the reconciliation
//! loop can be driven by an in-memory fake in tests and by the real
//! pub/sub service in the client binary.
//!
//! The returned futures are not required to be `Send`: the session polls
//! everything on a single task.

use std::future::Future;

use futures::Stream;
use lobby_types::{HereNow, PresenceMessage, SessionId};

use crate::error::LobbyError;

/// A publish/subscribe service with a presence sub-protocol.
pub trait PresenceTransport {
    /// Stream of raw presence notifications for a subscribed channel.
    ///
    /// Ends when the subscription is torn down or the connection is lost.
    type Events: Stream<Item = PresenceMessage> + Unpin;

    /// Join `channel` with presence enabled and start receiving its
    /// presence notifications.
    fn subscribe(&self, channel: &str) -> impl Future<Output = Result<Self::Events, LobbyError>>;

    /// Leave `channel`.
    fn unsubscribe(&self, channel: &str) -> impl Future<Output = Result<(), LobbyError>>;

    /// List everyone currently on `channel`, with identifiers and state.
    fn here_now(&self, channel: &str) -> impl Future<Output = Result<HereNow, LobbyError>>;
}

/// Out-of-band notification that this client is leaving, so the service
/// can drop it from presence without waiting for a heartbeat timeout.
pub trait LeaveNotifier {
    /// Tell the service that `session` has left `channel`.
    fn notify_leave(
        &self,
        channel: &str,
        session: SessionId,
    ) -> impl Future<Output = Result<(), LobbyError>>;
}
