//! Read-only roster view handed to the UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{ParticipantId, SessionId};

/// What the UI renders as the participant list.
///
/// Published by the presence session every time the roster changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RosterView {
    /// This client's session identifier.
    pub session_id: SessionId,
    /// The tracked channel.
    pub channel: String,
    /// Present participants, in roster order.
    pub members: Vec<ParticipantId>,
    /// Number of entries in `members`.
    pub occupancy: usize,
    /// Whether the first snapshot has been applied.
    pub bootstrapped: bool,
    /// When the roster last changed.
    pub updated_at: DateTime<Utc>,
}

impl RosterView {
    /// An empty view for a session that has not bootstrapped yet.
    pub fn empty(session_id: SessionId, channel: &str) -> Self {
        Self {
            session_id,
            channel: channel.to_owned(),
            members: Vec::new(),
            occupancy: 0,
            bootstrapped: false,
            updated_at: Utc::now(),
        }
    }
}
