//! Error types for presence tracking.
//!
//! None of these ever reach the end user: the session logs them and
//! carries on with a roster that may be briefly stale until the next
//! snapshot.

/// Errors that can occur while talking to the presence service.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// Subscribe, unsubscribe, here-now, or leave call failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A bounded operation did not finish in time.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The bound that was exceeded.
        timeout_ms: u64,
    },

    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Whole milliseconds in `duration`, saturating, for log fields and
/// [`LobbyError::Timeout`].
pub(crate) fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
