//! Cancellable refresh timer.
//!
//! The session owns one [`RefreshTimer`] and awaits [`RefreshTimer::tick`]
//! inside its select loop. A stopped timer never fires, so the same loop
//! works before start and after teardown. Ticks missed while the session
//! was busy are delayed rather than bursted: at most one trigger is ever
//! pending.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Periodic trigger for snapshot refreshes.
#[derive(Debug)]
pub struct RefreshTimer {
    period: Duration,
    interval: Option<Interval>,
}

impl RefreshTimer {
    /// Create a stopped timer with the given period.
    ///
    /// `period` must be non-zero; configuration validation enforces this.
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// Start (or restart) the timer. The first tick fires immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    /// Stop the timer. Pending and future ticks are cancelled.
    pub fn stop(&mut self) {
        self.interval = None;
    }

    /// Cancel the pending tick and restart the period from now.
    ///
    /// Has no effect on a stopped timer.
    pub fn reset(&mut self) {
        if let Some(interval) = self.interval.as_mut() {
            interval.reset();
        }
    }

    /// Whether the timer is running.
    pub const fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// The configured period.
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next tick. Never completes while the timer is stopped.
    pub async fn tick(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => interval.tick().await,
            None => std::future::pending().await,
        }
    }
}
