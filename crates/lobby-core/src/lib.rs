//! Presence reconciliation for the lobby client.
//!
//! This crate owns the roster of participants present on the shared
//! channel and keeps it eventually consistent from two inputs:
//!
//! - periodic here-now **snapshots**, which replace the roster wholesale
//!   and correct any drift, and
//! - incremental **presence events** (join, leave, interval batches),
//!   applied idempotently between snapshots.
//!
//! # Modules
//!
//! - [`roster`] -- The deduplicated roster and its mutation API
//! - [`reconcile`] -- Applying presence events to a roster
//! - [`snapshot`] -- Sequenced snapshot fetch and wholesale replacement
//! - [`timer`] -- Cancellable refresh timer handle
//! - [`transport`] -- Traits for the pub/sub transport and leave notifier
//! - [`session`] -- The single-task session loop and teardown
//! - [`config`] -- YAML configuration with environment overrides
//! - [`error`] -- Error types

pub mod config;
pub mod error;
pub mod reconcile;
pub mod roster;
pub mod session;
pub mod snapshot;
pub mod timer;
pub mod transport;

pub use config::{ConfigError, LobbyConfig};
pub use error::LobbyError;
pub use roster::{Roster, RosterChange};
pub use session::{PresenceSession, SessionSettings};
pub use transport::{LeaveNotifier, PresenceTransport};
