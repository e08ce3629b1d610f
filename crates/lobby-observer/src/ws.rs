//! `WebSocket` handler for real-time roster streaming.
//!
//! Clients connect to `GET /ws/roster` and receive the current
//! [`RosterView`](lobby_types::RosterView) as a JSON text frame, then one
//! more frame each time the roster changes. A `watch` channel only keeps
//! the newest value, so a slow client skips intermediate rosters instead
//! of queueing them.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming roster views.
///
/// # Route
///
/// `GET /ws/roster`
pub async fn ws_roster(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("roster WebSocket client connected");

    let mut rx = state.subscribe();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    debug!("roster channel closed, shutting down WebSocket");
                    return;
                }
                let json = match serde_json::to_string(&*rx.borrow_and_update()) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize roster view");
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!("roster WebSocket client disconnected (send failed)");
                    return;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("roster WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("roster WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "roster WebSocket error");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}
