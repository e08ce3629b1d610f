//! Axum router construction for the observer API.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the observer server.
///
/// The router includes:
/// - `GET /` -- one-line plain-text status
/// - `GET /ws/roster` -- `WebSocket` roster stream
/// - `GET /api/roster` -- current roster view
/// - `GET /api/roster/{participant}` -- presence of one participant
/// - `GET /api/health` -- liveness and bootstrap state
///
/// CORS allows any origin so a browser UI served elsewhere can read it.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws/roster", get(ws::ws_roster))
        .route("/api/roster", get(handlers::get_roster))
        .route("/api/roster/{participant}", get(handlers::get_participant))
        .route("/api/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
