//! Shared type definitions for the lobby presence client.
//!
//! Types defined here cross every crate boundary in the workspace: the
//! transport decodes wire messages into them, the core reconciles them
//! into a roster, and the observer serves the resulting view. The view
//! types flow downstream to `TypeScript` via `ts-rs` for the browser UI.
//!
//! # Modules
//!
//! - [`ids`] -- Session and participant identifiers
//! - [`presence`] -- Presence wire messages and validated presence events
//! - [`snapshot`] -- Here-now occupant snapshots
//! - [`view`] -- Read-only roster view exposed to the UI

pub mod ids;
pub mod presence;
pub mod snapshot;
pub mod view;

// Re-export all public types at crate root for convenience.
pub use ids::{ParticipantId, SessionId};
pub use presence::{MalformedEvent, PresenceEvent, PresenceMessage};
pub use snapshot::{HereNow, Occupant};
pub use view::RosterView;
