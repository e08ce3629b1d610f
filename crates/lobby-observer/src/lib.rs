//! Roster observer API for the lobby client.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/roster`) pushing the roster every time
//!   it changes
//! - **REST endpoints** for the current roster, a single participant, and
//!   session health
//! - **Plain-text status line** (`GET /`)
//!
//! # Architecture
//!
//! The presence session owns the roster and publishes a
//! [`RosterView`](lobby_types::RosterView) on a [`tokio::sync::watch`]
//! channel. The observer only ever holds receivers, so it can read the
//! latest view at any time without touching the session task.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, bind, serve};
pub use state::AppState;
