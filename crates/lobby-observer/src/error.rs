//! Error types for the observer API.
//!
//! [`ObserverError`] converts into an Axum response with a JSON body of the
//! form `{ "error": ..., "status": ... }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The participant is not on the roster.
    #[error("not present: {0}")]
    NotPresent(String),

    /// The path did not name a usable participant identifier.
    #[error("invalid participant: {0}")]
    InvalidParticipant(String),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotPresent(id) => (StatusCode::NOT_FOUND, format!("{id} is not present")),
            Self::InvalidParticipant(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
