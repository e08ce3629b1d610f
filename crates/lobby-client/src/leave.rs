//! Out-of-band leave notification over the presence REST API.
//!
//! Sent at shutdown alongside the regular unsubscribe so that peers see
//! this client leave immediately instead of after a heartbeat timeout.

use std::sync::Arc;
use std::time::Duration;

use lobby_core::{LeaveNotifier, LobbyError};
use lobby_types::SessionId;
use tracing::debug;

use crate::endpoints::Endpoints;
use crate::pubnub::read_body;

/// Issues `GET .../channel/{channel}/leave?uuid={session}`.
pub struct HttpLeaveNotifier {
    client: reqwest::Client,
    endpoints: Arc<Endpoints>,
    timeout: Duration,
}

impl HttpLeaveNotifier {
    /// Create a notifier whose requests give up after `timeout`.
    pub const fn new(client: reqwest::Client, endpoints: Arc<Endpoints>, timeout: Duration) -> Self {
        Self {
            client,
            endpoints,
            timeout,
        }
    }
}

impl LeaveNotifier for HttpLeaveNotifier {
    async fn notify_leave(&self, channel: &str, session: SessionId) -> Result<(), LobbyError> {
        let url = self.endpoints.leave_url(channel, &session.to_string())?;
        debug!(%url, "sending leave notification");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LobbyError::Timeout {
                        operation: "leave",
                        timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    }
                } else {
                    LobbyError::Transport(format!("leave request failed: {e}"))
                }
            })?;

        read_body(response, "leave").await?;
        Ok(())
    }
}
