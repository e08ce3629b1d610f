//! Integration tests for the presence session loop.
//!
//! The session is driven by an in-memory transport whose here-now answers
//! are scripted and whose presence stream is fed through an unbounded
//! channel. Time is paused, so timer ticks land exactly on the refresh
//! period and every sleep in the driver advances the clock deterministically.

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use lobby_core::{LeaveNotifier, LobbyError, PresenceSession, PresenceTransport, SessionSettings};
use lobby_types::{HereNow, ParticipantId, PresenceMessage, RosterView, SessionId};
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, sleep};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TransportState {
    snapshots: VecDeque<Result<Vec<&'static str>, &'static str>>,
    /// Latency of each here-now call, in call order; missing entries answer at once.
    latencies: VecDeque<Duration>,
    subscribe_latency: Option<Duration>,
    receiver: Option<UnboundedReceiver<PresenceMessage>>,
    subscribe_failures: u32,
    subscribe_calls: u32,
    here_now_calls: u32,
    unsubscribed: Vec<String>,
    fail_unsubscribe: bool,
}

#[derive(Clone, Default)]
struct FakeTransport(Rc<RefCell<TransportState>>);

impl FakeTransport {
    fn scripted(
        snapshots: Vec<Result<Vec<&'static str>, &'static str>>,
    ) -> (Self, UnboundedSender<PresenceMessage>) {
        let (tx, rx) = mpsc::unbounded();
        let fake = Self::default();
        {
            let mut state = fake.0.borrow_mut();
            state.snapshots = snapshots.into();
            state.receiver = Some(rx);
        }
        (fake, tx)
    }
}

impl PresenceTransport for FakeTransport {
    type Events = UnboundedReceiver<PresenceMessage>;

    async fn subscribe(&self, _channel: &str) -> Result<Self::Events, LobbyError> {
        let latency = {
            let mut state = self.0.borrow_mut();
            state.subscribe_calls += 1;
            state.subscribe_latency
        };
        if let Some(latency) = latency {
            sleep(latency).await;
        }
        let mut state = self.0.borrow_mut();
        if state.subscribe_failures > 0 {
            state.subscribe_failures -= 1;
            return Err(LobbyError::Transport(String::from("subscribe refused")));
        }
        state
            .receiver
            .take()
            .ok_or_else(|| LobbyError::Transport(String::from("already subscribed")))
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), LobbyError> {
        let mut state = self.0.borrow_mut();
        state.unsubscribed.push(channel.to_owned());
        if state.fail_unsubscribe {
            return Err(LobbyError::Transport(String::from("connection reset")));
        }
        Ok(())
    }

    async fn here_now(&self, _channel: &str) -> Result<HereNow, LobbyError> {
        // The answer is fixed when the call is made, not when it returns.
        let (answer, latency) = {
            let mut state = self.0.borrow_mut();
            state.here_now_calls += 1;
            (state.snapshots.pop_front(), state.latencies.pop_front().unwrap_or_default())
        };
        if !latency.is_zero() {
            sleep(latency).await;
        }
        match answer {
            Some(Ok(members)) => Ok(HereNow::from_identifiers(
                members.into_iter().map(|m| ParticipantId::new(m).unwrap()),
            )),
            Some(Err(reason)) => Err(LobbyError::Transport(reason.to_owned())),
            None => Err(LobbyError::Transport(String::from("no scripted snapshot"))),
        }
    }
}

#[derive(Default)]
struct NotifierState {
    calls: Vec<(String, SessionId)>,
    hang: bool,
}

#[derive(Clone, Default)]
struct FakeNotifier(Rc<RefCell<NotifierState>>);

impl LeaveNotifier for FakeNotifier {
    async fn notify_leave(&self, channel: &str, session: SessionId) -> Result<(), LobbyError> {
        let hang = {
            let mut state = self.0.borrow_mut();
            state.calls.push((channel.to_owned(), session));
            state.hang
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const REFRESH: Duration = Duration::from_millis(2000);
const LEAVE_TIMEOUT: Duration = Duration::from_millis(1000);

fn settings() -> SessionSettings {
    SessionSettings {
        channel: String::from("playerlobby"),
        refresh_interval: REFRESH,
        fetch_timeout: Duration::from_millis(5000),
        leave_timeout: LEAVE_TIMEOUT,
    }
}

const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn members(view: &watch::Receiver<RosterView>) -> Vec<String> {
    view.borrow()
        .members
        .iter()
        .map(|m| m.as_str().to_owned())
        .collect()
}

fn names(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|r| (*r).to_owned()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn end_to_end_roster_scenario() {
    let (transport, events) =
        FakeTransport::scripted(vec![Ok(vec!["P1", "P2"]), Ok(vec!["P2", "P3", "P4"])]);
    let mut session =
        PresenceSession::new(SessionId::new(), settings(), transport, FakeNotifier::default());
    let view = session.subscribe_view();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let driver = async move {
        sleep(ms(100)).await;
        assert_eq!(members(&view), names(&["P1", "P2"]));
        assert!(view.borrow().bootstrapped);

        events.unbounded_send(PresenceMessage::join("P3", 3)).unwrap();
        sleep(ms(10)).await;
        assert_eq!(members(&view), names(&["P1", "P2", "P3"]));

        events.unbounded_send(PresenceMessage::leave("P1", 2)).unwrap();
        sleep(ms(10)).await;
        assert_eq!(members(&view), names(&["P2", "P3"]));

        sleep(REFRESH).await;
        assert_eq!(members(&view), names(&["P2", "P3", "P4"]));

        stop_tx.send(()).unwrap();
    };

    tokio::join!(
        session.run(async {
            let _ = stop_rx.await;
        }),
        driver
    );

    let roster: Vec<&str> = session.roster().members().iter().map(ParticipantId::as_str).collect();
    assert_eq!(roster, vec!["P2", "P3", "P4"]);
}

#[tokio::test(start_paused = true)]
async fn events_before_bootstrap_are_discarded() {
    let (transport, events) = FakeTransport::scripted(vec![Err("503"), Ok(vec!["A"])]);
    let calls = transport.clone();
    let mut session =
        PresenceSession::new(SessionId::new(), settings(), transport, FakeNotifier::default());
    let view = session.subscribe_view();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let driver = async move {
        sleep(ms(10)).await;
        events.unbounded_send(PresenceMessage::join("X", 1)).unwrap();
        sleep(ms(10)).await;
        assert!(!view.borrow().bootstrapped);
        assert!(members(&view).is_empty());

        // Failed fetch is retried on the next tick.
        sleep(REFRESH).await;
        assert_eq!(calls.0.borrow().here_now_calls, 2);
        assert_eq!(members(&view), names(&["A"]));

        events.unbounded_send(PresenceMessage::join("X", 2)).unwrap();
        sleep(ms(10)).await;
        assert_eq!(members(&view), names(&["A", "X"]));

        stop_tx.send(()).unwrap();
    };

    tokio::join!(
        session.run(async {
            let _ = stop_rx.await;
        }),
        driver
    );
}

#[tokio::test(start_paused = true)]
async fn failed_snapshot_keeps_event_built_roster() {
    let (transport, events) = FakeTransport::scripted(vec![Ok(vec!["A"]), Err("timeout")]);
    let mut session =
        PresenceSession::new(SessionId::new(), settings(), transport, FakeNotifier::default());
    let view = session.subscribe_view();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let driver = async move {
        sleep(ms(10)).await;
        events.unbounded_send(PresenceMessage::join("B", 2)).unwrap();
        sleep(ms(10)).await;
        assert_eq!(members(&view), names(&["A", "B"]));

        sleep(REFRESH).await;
        assert_eq!(members(&view), names(&["A", "B"]));

        stop_tx.send(()).unwrap();
    };

    tokio::join!(
        session.run(async {
            let _ = stop_rx.await;
        }),
        driver
    );
}

#[tokio::test(start_paused = true)]
async fn malformed_events_are_skipped() {
    let (transport, events) = FakeTransport::scripted(vec![Ok(vec!["A"])]);
    let mut session =
        PresenceSession::new(SessionId::new(), settings(), transport, FakeNotifier::default());
    let view = session.subscribe_view();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let driver = async move {
        sleep(ms(10)).await;
        let no_uuid = PresenceMessage {
            action: Some(String::from("join")),
            occupancy: Some(2),
            ..PresenceMessage::default()
        };
        events.unbounded_send(no_uuid).unwrap();
        events.unbounded_send(PresenceMessage::default()).unwrap();
        events.unbounded_send(PresenceMessage::join("B", 2)).unwrap();
        sleep(ms(10)).await;
        assert_eq!(members(&view), names(&["A", "B"]));

        stop_tx.send(()).unwrap();
    };

    tokio::join!(
        session.run(async {
            let _ = stop_rx.await;
        }),
        driver
    );
}

#[tokio::test(start_paused = true)]
async fn interval_batch_and_duplicates_keep_roster_unique() {
    let (transport, events) = FakeTransport::scripted(vec![Ok(vec!["A", "B"])]);
    let mut session =
        PresenceSession::new(SessionId::new(), settings(), transport, FakeNotifier::default());
    let view = session.subscribe_view();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let driver = async move {
        sleep(ms(10)).await;
        events.unbounded_send(PresenceMessage::join("A", 2)).unwrap();
        events
            .unbounded_send(PresenceMessage::interval(&["C", "D", "B"], &["A", "C"], 3))
            .unwrap();
        events.unbounded_send(PresenceMessage::leave("ghost", 3)).unwrap();
        sleep(ms(10)).await;
        assert_eq!(members(&view), names(&["B", "D"]));

        stop_tx.send(()).unwrap();
    };

    tokio::join!(
        session.run(async {
            let _ = stop_rx.await;
        }),
        driver
    );
}

#[tokio::test(start_paused = true)]
async fn refresh_request_triggers_immediate_snapshot() {
    let (transport, events) = FakeTransport::scripted(vec![Ok(vec!["A"]), Ok(vec!["A", "B", "C"])]);
    let calls = transport.clone();
    let mut session =
        PresenceSession::new(SessionId::new(), settings(), transport, FakeNotifier::default());
    let view = session.subscribe_view();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let driver = async move {
        sleep(ms(10)).await;
        let refresh = PresenceMessage {
            action: Some(String::from("interval")),
            occupancy: Some(3),
            here_now_refresh: Some(true),
            ..PresenceMessage::default()
        };
        events.unbounded_send(refresh).unwrap();
        sleep(ms(10)).await;

        assert_eq!(calls.0.borrow().here_now_calls, 2);
        assert_eq!(members(&view), names(&["A", "B", "C"]));

        stop_tx.send(()).unwrap();
    };

    tokio::join!(
        session.run(async {
            let _ = stop_rx.await;
        }),
        driver
    );
}

#[tokio::test(start_paused = true)]
async fn failed_subscribe_is_retried_on_next_tick() {
    let (transport, events) = FakeTransport::scripted(vec![Ok(vec!["A"]), Ok(vec!["A"])]);
    transport.0.borrow_mut().subscribe_failures = 1;
    let calls = transport.clone();
    let mut session =
        PresenceSession::new(SessionId::new(), settings(), transport, FakeNotifier::default());
    let view = session.subscribe_view();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let driver = async move {
        sleep(ms(100)).await;
        // Snapshots still flow without a subscription. The next attempt
        // rides on the following tick, one full period later.
        assert_eq!(members(&view), names(&["A"]));
        events.unbounded_send(PresenceMessage::join("late", 2)).unwrap();
        sleep(ms(100)).await;
        assert_eq!(members(&view), names(&["A"]));

        sleep(REFRESH).await;
        assert_eq!(calls.0.borrow().subscribe_calls, 2);
        assert_eq!(members(&view), names(&["A", "late"]));

        stop_tx.send(()).unwrap();
    };

    tokio::join!(
        session.run(async {
            let _ = stop_rx.await;
        }),
        driver
    );
}

#[tokio::test(start_paused = true)]
async fn hung_subscribe_does_not_block_snapshots_or_shutdown() {
    let (transport, _events) = FakeTransport::scripted(vec![Ok(vec!["P1"])]);
    transport.0.borrow_mut().subscribe_latency = Some(Duration::from_secs(310));
    let calls = transport.clone();
    let mut session =
        PresenceSession::new(SessionId::new(), settings(), transport, FakeNotifier::default());
    let view = session.subscribe_view();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let driver = async move {
        sleep(ms(10)).await;
        assert!(view.borrow().bootstrapped);
        assert_eq!(members(&view), names(&["P1"]));

        sleep(ms(40)).await;
        stop_tx.send(()).unwrap();
        Instant::now()
    };

    let ((), stopped_at) = tokio::join!(
        session.run(async {
            let _ = stop_rx.await;
        }),
        driver
    );

    assert!(stopped_at.elapsed() < LEAVE_TIMEOUT);
    assert_eq!(calls.0.borrow().subscribe_calls, 1);
    assert_eq!(calls.0.borrow().unsubscribed, vec![String::from("playerlobby")]);
}

#[tokio::test(start_paused = true)]
async fn overlapping_snapshots_resolve_out_of_order() {
    let (transport, _events) = FakeTransport::scripted(vec![Ok(vec!["old"]), Ok(vec!["new"])]);
    transport.0.borrow_mut().latencies = vec![ms(3000), ms(10)].into();
    let calls = transport.clone();
    let mut session =
        PresenceSession::new(SessionId::new(), settings(), transport, FakeNotifier::default());
    let view = session.subscribe_view();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let driver = async move {
        sleep(ms(100)).await;
        assert!(!view.borrow().bootstrapped);

        // The second fetch, issued at the 2s tick, lands first.
        sleep(ms(2000)).await;
        assert_eq!(calls.0.borrow().here_now_calls, 2);
        assert_eq!(members(&view), names(&["new"]));

        // The first fetch lands at 3s and is discarded.
        sleep(ms(1000)).await;
        assert_eq!(members(&view), names(&["new"]));
        assert_eq!(calls.0.borrow().here_now_calls, 2);

        stop_tx.send(()).unwrap();
    };

    tokio::join!(
        session.run(async {
            let _ = stop_rx.await;
        }),
        driver
    );
}

#[tokio::test(start_paused = true)]
async fn in_flight_snapshot_replaces_events_applied_meanwhile() {
    let (transport, events) = FakeTransport::scripted(vec![Ok(vec!["A"]), Ok(vec!["A"])]);
    transport.0.borrow_mut().latencies = vec![Duration::ZERO, ms(500)].into();
    let mut session =
        PresenceSession::new(SessionId::new(), settings(), transport, FakeNotifier::default());
    let view = session.subscribe_view();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let driver = async move {
        sleep(ms(10)).await;
        assert_eq!(members(&view), names(&["A"]));

        // The 2s fetch is in flight until 2.5s; B joins while it is pending.
        sleep(ms(2090)).await;
        events.unbounded_send(PresenceMessage::join("B", 2)).unwrap();
        sleep(ms(10)).await;
        assert_eq!(members(&view), names(&["A", "B"]));

        // The snapshot was taken before B joined and replaces the roster.
        sleep(ms(500)).await;
        assert_eq!(members(&view), names(&["A"]));

        stop_tx.send(()).unwrap();
    };

    tokio::join!(
        session.run(async {
            let _ = stop_rx.await;
        }),
        driver
    );
}

#[tokio::test(start_paused = true)]
async fn teardown_completes_when_unsubscribe_and_leave_fail() {
    let (transport, _events) = FakeTransport::scripted(vec![Ok(vec!["A"])]);
    transport.0.borrow_mut().fail_unsubscribe = true;
    let transport_calls = transport.clone();

    let notifier = FakeNotifier::default();
    notifier.0.borrow_mut().hang = true;
    let notifier_calls = notifier.clone();

    let session_id = SessionId::new();
    let mut session = PresenceSession::new(session_id, settings(), transport, notifier);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let driver = async move {
        sleep(ms(50)).await;
        stop_tx.send(()).unwrap();
        Instant::now()
    };

    let ((), stopped_at) = tokio::join!(
        session.run(async {
            let _ = stop_rx.await;
        }),
        driver
    );

    // The hanging notifier is cut off at the leave timeout.
    let teardown = stopped_at.elapsed();
    assert!(teardown >= LEAVE_TIMEOUT);
    assert!(teardown < LEAVE_TIMEOUT + ms(100));
    assert_eq!(transport_calls.0.borrow().unsubscribed, vec![String::from("playerlobby")]);
    assert_eq!(
        notifier_calls.0.borrow().calls,
        vec![(String::from("playerlobby"), session_id)]
    );
}
