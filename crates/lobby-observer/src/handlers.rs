//! REST endpoint handlers for the observer server.
//!
//! All handlers read the latest [`RosterView`] from the shared
//! [`AppState`]; none of them wait on the presence session.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | One-line plain-text status |
//! | `GET` | `/api/roster` | Current roster view |
//! | `GET` | `/api/roster/:participant` | Whether one participant is present |
//! | `GET` | `/api/health` | Liveness and bootstrap state |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use lobby_types::{ParticipantId, RosterView};

use crate::error::ObserverError;
use crate::state::AppState;

/// Plain-text status line: session, channel, and head count.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let view = state.current();
    let phase = if view.bootstrapped {
        "live"
    } else {
        "waiting for first snapshot"
    };
    format!(
        "lobby session {} on {}: {} present ({phase})\n",
        view.session_id, view.channel, view.occupancy
    )
}

/// The current roster.
///
/// # Route
///
/// `GET /api/roster`
pub async fn get_roster(State(state): State<Arc<AppState>>) -> Json<RosterView> {
    Json(state.current())
}

/// Whether a single participant is on the roster.
///
/// # Route
///
/// `GET /api/roster/{participant}`
///
/// Returns 404 when the participant is not present.
pub async fn get_participant(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<serde_json::Value>, ObserverError> {
    let participant = ParticipantId::new(raw.trim())
        .ok_or_else(|| ObserverError::InvalidParticipant(String::from("empty identifier")))?;

    let view = state.current();
    let position = view
        .members
        .iter()
        .position(|m| *m == participant)
        .ok_or_else(|| ObserverError::NotPresent(participant.to_string()))?;

    Ok(Json(serde_json::json!({
        "participant": participant,
        "present": true,
        "position": position,
        "is_self": participant == view.session_id.as_participant(),
    })))
}

/// Liveness plus whether the roster has been bootstrapped.
///
/// # Route
///
/// `GET /api/health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let view = state.current();
    Json(serde_json::json!({
        "status": "ok",
        "bootstrapped": view.bootstrapped,
        "occupancy": view.occupancy,
    }))
}
