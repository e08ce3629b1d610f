//! Snapshot fetch and wholesale roster replacement.
//!
//! Every refresh asks the presence service who is on the channel right now
//! and replaces the roster with the answer. Replacement (rather than a
//! union) is what clears out participants whose leave event we never saw.
//!
//! Fetches may overlap when the service is slower than the refresh
//! interval, so each one is tagged with a sequence number from a
//! [`SnapshotGate`]. A result older than the last applied snapshot is
//! dropped instead of rolling the roster back.

use std::time::Duration;

use lobby_types::ParticipantId;
use tracing::debug;

use crate::error::{LobbyError, millis};
use crate::roster::{Roster, RosterChange};
use crate::transport::PresenceTransport;

/// Issues snapshot sequence numbers and remembers the newest one applied.
#[derive(Debug, Clone, Default)]
pub struct SnapshotGate {
    issued: u64,
    applied: Option<u64>,
}

impl SnapshotGate {
    /// Create a gate with nothing issued or applied.
    pub const fn new() -> Self {
        Self {
            issued: 0,
            applied: None,
        }
    }

    /// Reserve the sequence number for a fetch about to be issued.
    pub const fn issue(&mut self) -> u64 {
        self.issued = self.issued.saturating_add(1);
        self.issued
    }

    /// Whether a snapshot has ever been applied.
    ///
    /// The event reconciler only runs once this is `true`.
    pub const fn bootstrapped(&self) -> bool {
        self.applied.is_some()
    }

    /// Sequence number of the newest applied snapshot.
    pub const fn latest_applied(&self) -> Option<u64> {
        self.applied
    }

    /// Record `seq` as applied if it is newer than anything applied so far.
    ///
    /// Returns `false` for stale results, which must be discarded.
    pub fn accept(&mut self, seq: u64) -> bool {
        match self.applied {
            Some(latest) if seq <= latest => false,
            _ => {
                self.applied = Some(seq);
                true
            }
        }
    }
}

/// What happened to one completed fetch.
#[derive(Debug)]
pub enum SnapshotOutcome {
    /// The roster was replaced.
    Applied {
        /// Difference between the old and new roster.
        change: RosterChange,
        /// `true` if this was the first snapshot ever applied.
        bootstrap: bool,
    },
    /// A newer snapshot had already been applied; this one was dropped.
    Stale {
        /// Sequence number of the dropped result.
        seq: u64,
        /// Sequence number of the snapshot already in place.
        latest: u64,
    },
    /// The fetch failed; the roster is unchanged.
    Failed(LobbyError),
}

/// Query the transport for the channel's current occupants.
///
/// The query is bounded by `timeout`; expiry is reported as
/// [`LobbyError::Timeout`].
pub async fn fetch_presence<T: PresenceTransport>(
    transport: &T,
    channel: &str,
    timeout: Duration,
) -> Result<Vec<ParticipantId>, LobbyError> {
    let here_now = tokio::time::timeout(timeout, transport.here_now(channel))
        .await
        .map_err(|_elapsed| LobbyError::Timeout {
            operation: "here_now",
            timeout_ms: millis(timeout),
        })??;

    debug!(
        channel = channel,
        total_occupancy = here_now.total_occupancy,
        listed = here_now.occupants.len(),
        "here_now snapshot received"
    );

    Ok(here_now.identifiers())
}

/// Fold a completed fetch into the roster.
pub fn apply_snapshot(
    roster: &mut Roster,
    gate: &mut SnapshotGate,
    seq: u64,
    result: Result<Vec<ParticipantId>, LobbyError>,
) -> SnapshotOutcome {
    let members = match result {
        Ok(members) => members,
        Err(e) => return SnapshotOutcome::Failed(e),
    };

    let bootstrap = !gate.bootstrapped();
    if !gate.accept(seq) {
        return SnapshotOutcome::Stale {
            seq,
            latest: gate.latest_applied().unwrap_or(seq),
        };
    }

    SnapshotOutcome::Applied {
        change: roster.replace_all(members),
        bootstrap,
    }
}
