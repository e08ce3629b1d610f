//! Identifiers used on the presence channel.
//!
//! A [`SessionId`] names this client for the lifetime of one connection.
//! A [`ParticipantId`] is whatever identifier a peer announced on the
//! channel; it is opaque to us and only compared for equality.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Identifier this client presents on the presence channel.
///
/// Generated once at startup (UUID v4) unless configured explicitly, and
/// stable for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }

    /// The identifier as it appears in the roster of other peers.
    pub fn as_participant(self) -> ParticipantId {
        ParticipantId(self.0.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Identifier of a participant present on the channel.
///
/// Built through [`ParticipantId::new`], which rejects empty identifiers:
/// an empty identifier on the wire is treated the same as a missing one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ParticipantId(#[ts(type = "string")] String);

impl ParticipantId {
    /// Wrap a raw identifier, returning `None` if it is empty.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
