//! Shared application state for the observer server.

use lobby_types::RosterView;
use tokio::sync::watch;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor. Holds a receiver on the session's roster channel; the
/// session keeps the sender.
#[derive(Debug, Clone)]
pub struct AppState {
    roster: watch::Receiver<RosterView>,
}

impl AppState {
    /// Wrap a roster receiver obtained from the presence session.
    pub const fn new(roster: watch::Receiver<RosterView>) -> Self {
        Self { roster }
    }

    /// The most recently published roster.
    pub fn current(&self) -> RosterView {
        self.roster.borrow().clone()
    }

    /// A fresh receiver for streaming roster changes.
    ///
    /// The current value counts as unseen, so a new subscriber gets it
    /// before any later change.
    pub fn subscribe(&self) -> watch::Receiver<RosterView> {
        let mut rx = self.roster.clone();
        rx.mark_changed();
        rx
    }
}
