//! Presence wire messages and the validated events derived from them.
//!
//! The presence channel delivers loosely-typed JSON objects keyed by an
//! `action` field. [`PresenceMessage`] decodes them leniently (every field
//! optional) so that a single bad message never poisons the stream, and
//! [`PresenceEvent::from_message`] validates one into the tagged union the
//! reconciler understands.
//!
//! | `action` | Event |
//! |----------|-------|
//! | `join` | [`PresenceEvent::Join`] |
//! | `leave`, `timeout` | [`PresenceEvent::Leave`] |
//! | `interval` | [`PresenceEvent::IntervalBatch`] or [`PresenceEvent::RefreshRequested`] |
//! | `state-change`, anything else | ignored |

use serde::{Deserialize, Serialize};

use crate::ids::ParticipantId;

/// A raw presence notification as delivered by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMessage {
    /// Presence action (`join`, `leave`, `timeout`, `interval`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Identifier of the peer for single-peer actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Channel occupancy after the action, as reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<u32>,
    /// Peers that joined during an interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<Vec<String>>,
    /// Peers that left during an interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leave: Option<Vec<String>>,
    /// Peers whose heartbeat expired during an interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Vec<String>>,
    /// Set by the service when an interval had too many changes to list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub here_now_refresh: Option<bool>,
    /// Service timestamp (seconds since the epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl PresenceMessage {
    /// A `join` message for `uuid`.
    pub fn join(uuid: &str, occupancy: u32) -> Self {
        Self {
            action: Some(String::from("join")),
            uuid: Some(uuid.to_owned()),
            occupancy: Some(occupancy),
            ..Self::default()
        }
    }

    /// A `leave` message for `uuid`.
    pub fn leave(uuid: &str, occupancy: u32) -> Self {
        Self {
            action: Some(String::from("leave")),
            uuid: Some(uuid.to_owned()),
            occupancy: Some(occupancy),
            ..Self::default()
        }
    }

    /// An `interval` message listing joins and leaves.
    pub fn interval(joined: &[&str], left: &[&str], occupancy: u32) -> Self {
        Self {
            action: Some(String::from("interval")),
            occupancy: Some(occupancy),
            join: Some(joined.iter().map(|s| (*s).to_owned()).collect()),
            leave: Some(left.iter().map(|s| (*s).to_owned()).collect()),
            ..Self::default()
        }
    }
}

/// Why a presence message could not become a [`PresenceEvent`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedEvent {
    /// The message carried no `action` field.
    #[error("presence message has no action")]
    MissingAction,

    /// A single-peer action carried no (or an empty) identifier.
    #[error("presence {action} has no identifier")]
    MissingIdentifier {
        /// The action that required an identifier.
        action: String,
    },
}

/// A validated presence event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// A peer joined the channel.
    Join {
        /// The peer that joined.
        identifier: ParticipantId,
        /// Reported occupancy; informational only.
        occupancy: u32,
    },
    /// A peer left the channel, gracefully or by heartbeat timeout.
    Leave {
        /// The peer that left.
        identifier: ParticipantId,
        /// Reported occupancy; informational only.
        occupancy: u32,
    },
    /// Joins and leaves accumulated by the service over one interval.
    IntervalBatch {
        /// Peers that joined, applied first.
        joined: Vec<ParticipantId>,
        /// Peers that left or timed out, applied after the joins.
        left: Vec<ParticipantId>,
        /// Reported occupancy; informational only.
        occupancy: u32,
    },
    /// The interval was too large to enumerate; the roster should be
    /// refreshed from a snapshot.
    RefreshRequested {
        /// Reported occupancy; informational only.
        occupancy: u32,
    },
}

impl PresenceEvent {
    /// Validate a wire message.
    ///
    /// Returns `Ok(None)` for actions that carry no roster information
    /// (`state-change` and unknown actions).
    pub fn from_message(message: &PresenceMessage) -> Result<Option<Self>, MalformedEvent> {
        let action = message.action.as_deref().ok_or(MalformedEvent::MissingAction)?;
        let occupancy = message.occupancy.unwrap_or(0);

        match action {
            "join" => Ok(Some(Self::Join {
                identifier: single_identifier(message, action)?,
                occupancy,
            })),
            "leave" | "timeout" => Ok(Some(Self::Leave {
                identifier: single_identifier(message, action)?,
                occupancy,
            })),
            "interval" => {
                if message.here_now_refresh == Some(true) {
                    return Ok(Some(Self::RefreshRequested { occupancy }));
                }
                let joined = identifiers(message.join.iter().flatten());
                let left = identifiers(
                    message
                        .leave
                        .iter()
                        .flatten()
                        .chain(message.timeout.iter().flatten()),
                );
                Ok(Some(Self::IntervalBatch {
                    joined,
                    left,
                    occupancy,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Short name of the event kind, for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::IntervalBatch { .. } => "interval",
            Self::RefreshRequested { .. } => "refresh",
        }
    }
}

fn single_identifier(message: &PresenceMessage, action: &str) -> Result<ParticipantId, MalformedEvent> {
    message
        .uuid
        .clone()
        .and_then(ParticipantId::new)
        .ok_or_else(|| MalformedEvent::MissingIdentifier {
            action: action.to_owned(),
        })
}

/// Interval entries that are empty are dropped rather than failing the batch.
fn identifiers<'a>(raw: impl Iterator<Item = &'a String>) -> Vec<ParticipantId> {
    raw.filter_map(|id| ParticipantId::new(id.as_str())).collect()
}
