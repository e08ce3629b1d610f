//! The presence session: a single task that owns the roster.
//!
//! [`PresenceSession::run`] multiplexes five inputs with `tokio::select!`:
//!
//! 1. the shutdown signal,
//! 2. completed here-now fetches,
//! 3. the subscribe handshake, while one is pending,
//! 4. presence notifications from the subscription,
//! 5. refresh timer ticks, each of which issues a new fetch and, when
//!    there is no subscription, a new subscribe attempt.
//!
//! Everything that mutates the roster runs in the select handlers, on this
//! one task, so no handler ever observes a half-applied snapshot and no
//! locking is needed. Fetches are polled concurrently with event handling
//! instead of blocking it; events that arrive while a fetch is in flight
//! are applied in arrival order, and the fetch result replaces the roster
//! when it lands (unless a newer snapshot already did).
//!
//! Presence notifications are discarded until the first snapshot has been
//! applied. That snapshot already accounts for anything they would have
//! changed.

use std::future::Future;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt as _, Stream, StreamExt as _};
use lobby_types::{ParticipantId, PresenceEvent, PresenceMessage, RosterView, SessionId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::LobbyConfig;
use crate::error::{LobbyError, millis};
use crate::reconcile::reconcile;
use crate::roster::Roster;
use crate::snapshot::{SnapshotGate, SnapshotOutcome, apply_snapshot, fetch_presence};
use crate::timer::RefreshTimer;
use crate::transport::{LeaveNotifier, PresenceTransport};

/// A here-now fetch tagged with its sequence number.
type Fetch<'a> = LocalBoxFuture<'a, (u64, Result<Vec<ParticipantId>, LobbyError>)>;

/// A subscribe handshake; `None` once it has failed and been logged.
type Subscribe<'a, E> = LocalBoxFuture<'a, Option<E>>;

/// Channel and timing for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// The tracked channel.
    pub channel: String,
    /// Period of the snapshot refresh timer.
    pub refresh_interval: Duration,
    /// Bound on each here-now query.
    pub fetch_timeout: Duration,
    /// Bound on each teardown call.
    pub leave_timeout: Duration,
}

impl SessionSettings {
    /// Take the session settings out of the client configuration.
    pub fn from_config(config: &LobbyConfig) -> Self {
        Self {
            channel: config.channel.clone(),
            refresh_interval: config.presence.refresh_interval(),
            fetch_timeout: config.presence.fetch_timeout(),
            leave_timeout: config.presence.leave_timeout(),
        }
    }
}

/// The roster and the bookkeeping that decides what may change it.
struct RosterState {
    session_id: SessionId,
    channel: String,
    roster: Roster,
    gate: SnapshotGate,
    view_tx: watch::Sender<RosterView>,
}

impl RosterState {
    fn handle_snapshot(&mut self, seq: u64, result: Result<Vec<ParticipantId>, LobbyError>) {
        match apply_snapshot(&mut self.roster, &mut self.gate, seq, result) {
            SnapshotOutcome::Applied { change, bootstrap } => {
                if bootstrap {
                    info!(
                        channel = self.channel,
                        seq = seq,
                        members = self.roster.len(),
                        "bootstrap snapshot applied, reconciling presence events"
                    );
                } else if change.is_empty() {
                    debug!(seq = seq, members = self.roster.len(), "snapshot matches roster");
                } else {
                    info!(
                        seq = seq,
                        added = ?change.added,
                        removed = ?change.removed,
                        members = self.roster.len(),
                        "snapshot corrected roster"
                    );
                }
                if bootstrap || !change.is_empty() {
                    self.publish();
                }
            }
            SnapshotOutcome::Stale { seq, latest } => {
                debug!(seq = seq, latest = latest, "discarding stale snapshot");
            }
            SnapshotOutcome::Failed(e) => {
                warn!(
                    channel = self.channel,
                    seq = seq,
                    error = %e,
                    "here_now failed, roster unchanged until next refresh"
                );
            }
        }
    }

    /// Apply one presence notification.
    ///
    /// Returns `true` when the service asked for an immediate snapshot.
    fn handle_message(&mut self, message: &PresenceMessage) -> bool {
        if !self.gate.bootstrapped() {
            debug!(action = ?message.action, "presence event before bootstrap, discarded");
            return false;
        }

        let event = match PresenceEvent::from_message(message) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(action = ?message.action, "presence action carries no roster change");
                return false;
            }
            Err(e) => {
                debug!(error = %e, "skipping malformed presence event");
                return false;
            }
        };

        if let PresenceEvent::RefreshRequested { occupancy } = event {
            debug!(occupancy = occupancy, "service requested a here_now refresh");
            return true;
        }

        let change = reconcile(&mut self.roster, &event);
        if change.is_empty() {
            debug!(kind = event.kind(), "presence event already reflected in roster");
        } else {
            info!(
                kind = event.kind(),
                added = ?change.added,
                removed = ?change.removed,
                members = self.roster.len(),
                "roster updated"
            );
            self.publish();
        }
        false
    }

    fn view(&self) -> RosterView {
        RosterView {
            session_id: self.session_id,
            channel: self.channel.clone(),
            members: self.roster.members().to_vec(),
            occupancy: self.roster.len(),
            bootstrapped: self.gate.bootstrapped(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn publish(&self) {
        // send_replace succeeds even with no receivers attached.
        self.view_tx.send_replace(self.view());
    }
}

/// One client's presence on one channel.
///
/// Generic over the transport and the leave notifier so that the loop can
/// be driven by in-memory fakes in tests.
pub struct PresenceSession<T, L> {
    transport: T,
    notifier: L,
    timer: RefreshTimer,
    fetch_timeout: Duration,
    leave_timeout: Duration,
    state: RosterState,
}

impl<T: PresenceTransport, L: LeaveNotifier> PresenceSession<T, L> {
    /// Create a session. Nothing happens until [`run`](Self::run).
    pub fn new(session_id: SessionId, settings: SessionSettings, transport: T, notifier: L) -> Self {
        let (view_tx, _) = watch::channel(RosterView::empty(session_id, &settings.channel));
        Self {
            transport,
            notifier,
            timer: RefreshTimer::new(settings.refresh_interval),
            fetch_timeout: settings.fetch_timeout,
            leave_timeout: settings.leave_timeout,
            state: RosterState {
                session_id,
                channel: settings.channel,
                roster: Roster::new(),
                gate: SnapshotGate::new(),
                view_tx,
            },
        }
    }

    /// This client's session identifier.
    pub const fn session_id(&self) -> SessionId {
        self.state.session_id
    }

    /// The tracked channel.
    pub fn channel(&self) -> &str {
        &self.state.channel
    }

    /// The current roster.
    pub const fn roster(&self) -> &Roster {
        &self.state.roster
    }

    /// Whether the first snapshot has been applied.
    pub const fn is_bootstrapped(&self) -> bool {
        self.state.gate.bootstrapped()
    }

    /// A read-only view of the roster that updates on every change.
    pub fn subscribe_view(&self) -> watch::Receiver<RosterView> {
        self.state.view_tx.subscribe()
    }

    /// Run the session until `shutdown` completes, then tear down.
    ///
    /// Transport failures never end the loop: a failed subscribe or a lost
    /// stream is retried on the next refresh tick, and a failed fetch
    /// leaves the roster as it was. The subscribe handshake is polled
    /// alongside everything else, so a slow handshake delays neither
    /// snapshots nor shutdown.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        let channel = self.state.channel.clone();
        let fetch_timeout = self.fetch_timeout;
        let transport = &self.transport;
        let state = &mut self.state;
        let timer = &mut self.timer;

        let mut events: Option<T::Events> = None;
        let mut pending_subscribe: Option<Subscribe<'_, T::Events>> = None;
        let mut in_flight: FuturesUnordered<Fetch<'_>> = FuturesUnordered::new();
        tokio::pin!(shutdown);

        // The first tick is immediate and issues both the initial
        // subscribe and the bootstrap fetch.
        timer.start();
        info!(
            session_id = %state.session_id,
            channel = channel,
            refresh_ms = timer.period().as_millis(),
            "presence session started"
        );

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(channel = channel, "shutdown requested");
                    break;
                }

                Some((seq, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    state.handle_snapshot(seq, result);
                }

                subscribed = resolve(&mut pending_subscribe), if pending_subscribe.is_some() => {
                    pending_subscribe = None;
                    events = subscribed;
                }

                message = next_message(&mut events) => {
                    if let Some(message) = message {
                        if state.handle_message(&message) {
                            let seq = state.gate.issue();
                            in_flight.push(fetch_tagged(transport, &channel, fetch_timeout, seq).boxed_local());
                            timer.reset();
                        }
                    } else {
                        warn!(channel = channel, "presence stream ended, resubscribing on next refresh");
                        events = None;
                    }
                }

                _ = timer.tick() => {
                    if events.is_none() && pending_subscribe.is_none() {
                        pending_subscribe = Some(subscribe(transport, &channel).boxed_local());
                    }
                    let seq = state.gate.issue();
                    debug!(seq = seq, in_flight = in_flight.len(), "refresh timer fired, fetching snapshot");
                    in_flight.push(fetch_tagged(transport, &channel, fetch_timeout, seq).boxed_local());
                }
            }
        }

        // Detach the reconciler before leaving the channel.
        drop(pending_subscribe);
        drop(in_flight);
        drop(events);
        self.teardown().await;
    }

    /// Leave the channel.
    ///
    /// Stops the refresh timer, then unsubscribes and sends the out-of-band
    /// leave notification concurrently. Each call is bounded by the leave
    /// timeout; failures are logged and never returned, so teardown always
    /// completes.
    pub async fn teardown(&mut self) {
        self.timer.stop();

        let channel = self.state.channel.as_str();
        let session_id = self.state.session_id;
        let bound = self.leave_timeout;

        let unsubscribe = async {
            match tokio::time::timeout(bound, self.transport.unsubscribe(channel)).await {
                Ok(Ok(())) => info!(channel = channel, "unsubscribed"),
                Ok(Err(e)) => warn!(channel = channel, error = %e, "unsubscribe failed"),
                Err(_elapsed) => warn!(
                    channel = channel,
                    timeout_ms = millis(bound),
                    "unsubscribe timed out"
                ),
            }
        };

        let leave = async {
            match tokio::time::timeout(bound, self.notifier.notify_leave(channel, session_id)).await {
                Ok(Ok(())) => info!(session_id = %session_id, "leave notification delivered"),
                Ok(Err(e)) => warn!(session_id = %session_id, error = %e, "leave notification failed"),
                Err(_elapsed) => warn!(
                    session_id = %session_id,
                    timeout_ms = millis(bound),
                    "leave notification timed out"
                ),
            }
        };

        tokio::join!(unsubscribe, leave);
        info!(session_id = %session_id, channel = channel, "presence session torn down");
    }
}

async fn subscribe<T: PresenceTransport>(transport: &T, channel: &str) -> Option<T::Events> {
    match transport.subscribe(channel).await {
        Ok(events) => {
            info!(channel = channel, "subscribed with presence");
            Some(events)
        }
        Err(e) => {
            warn!(channel = channel, error = %e, "subscribe failed, retrying on next refresh");
            None
        }
    }
}

/// Output of the pending future, or never if there is none.
async fn resolve<F: Future + Unpin>(pending: &mut Option<F>) -> F::Output {
    match pending.as_mut() {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

/// Next notification, or never if there is no live subscription.
async fn next_message<S: Stream + Unpin>(events: &mut Option<S>) -> Option<S::Item> {
    match events.as_mut() {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn fetch_tagged<T: PresenceTransport>(
    transport: &T,
    channel: &str,
    timeout: Duration,
    seq: u64,
) -> (u64, Result<Vec<ParticipantId>, LobbyError>) {
    (seq, fetch_presence(transport, channel, timeout).await)
}
