//! PubNub REST implementation of [`PresenceTransport`].
//!
//! Subscribing is a handshake (`tt=0`) followed by an endless chain of
//! long-polls, each resuming from the cursor the previous one returned.
//! The chain is exposed as a [`BoxStream`] of presence messages taken
//! from the `-pnpres` companion channel; regular channel messages are
//! dropped. Dropping the stream cancels the in-flight long-poll.
//!
//! Transient failures (network errors, 5xx, throttling) are retried from
//! the same cursor after a short delay. Any other rejection ends the
//! stream, and the session resubscribes on its next refresh.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream};
use futures::StreamExt as _;
use lobby_core::config::TransportConfig;
use lobby_core::{LobbyError, PresenceTransport};
use lobby_types::{HereNow, Occupant, ParticipantId, PresenceMessage, SessionId};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::endpoints::{Endpoints, PRESENCE_SUFFIX, Timetoken};
use crate::leave::HttpLeaveNotifier;

/// Presence transport backed by the PubNub REST API.
pub struct PubNubTransport {
    client: reqwest::Client,
    endpoints: Arc<Endpoints>,
    uuid: String,
    subscribe_timeout: Duration,
    subscribe_retry: Duration,
}

impl PubNubTransport {
    /// Create a transport that presents `session` on the configured keyset.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Config`] if the origin is unusable.
    pub fn new(config: &TransportConfig, session: SessionId) -> Result<Self, LobbyError> {
        Ok(Self {
            client: reqwest::Client::new(),
            endpoints: Arc::new(Endpoints::new(config)?),
            uuid: session.to_string(),
            subscribe_timeout: config.subscribe_timeout(),
            subscribe_retry: config.subscribe_retry(),
        })
    }

    /// A leave notifier sharing this transport's connection pool.
    pub fn leave_notifier(&self, timeout: Duration) -> HttpLeaveNotifier {
        HttpLeaveNotifier::new(self.client.clone(), Arc::clone(&self.endpoints), timeout)
    }

    fn long_poll(&self, channel: &str) -> LongPoll {
        LongPoll {
            client: self.client.clone(),
            endpoints: Arc::clone(&self.endpoints),
            channel: channel.to_owned(),
            uuid: self.uuid.clone(),
            timeout: self.subscribe_timeout,
            retry: self.subscribe_retry,
        }
    }
}

impl PresenceTransport for PubNubTransport {
    type Events = BoxStream<'static, PresenceMessage>;

    async fn subscribe(&self, channel: &str) -> Result<Self::Events, LobbyError> {
        let poll = self.long_poll(channel);
        let (cursor, _) = poll.poll(None).await.map_err(|failure| failure.error)?;
        info!(channel = channel, timetoken = cursor.t, "subscribe handshake complete");
        Ok(poll.into_stream(cursor))
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), LobbyError> {
        let url = self.endpoints.leave_url(channel, &self.uuid)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LobbyError::Transport(format!("unsubscribe request failed: {e}")))?;
        read_body(response, "unsubscribe").await?;
        Ok(())
    }

    async fn here_now(&self, channel: &str) -> Result<HereNow, LobbyError> {
        let url = self.endpoints.here_now_url(channel, &self.uuid)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LobbyError::Transport(format!("here_now request failed: {e}")))?;
        let body = read_body(response, "here_now").await?;
        decode_here_now(&body)
    }
}

// ---------------------------------------------------------------------------
// Long-poll chain
// ---------------------------------------------------------------------------

struct PollFailure {
    error: LobbyError,
    retryable: bool,
}

impl PollFailure {
    const fn retry(error: LobbyError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }
}

struct LongPoll {
    client: reqwest::Client,
    endpoints: Arc<Endpoints>,
    channel: String,
    uuid: String,
    timeout: Duration,
    retry: Duration,
}

impl LongPoll {
    async fn poll(
        &self,
        cursor: Option<&Timetoken>,
    ) -> Result<(Timetoken, Vec<PresenceMessage>), PollFailure> {
        let url = self
            .endpoints
            .subscribe_url(&self.channel, &self.uuid, cursor)
            .map_err(|error| PollFailure {
                error,
                retryable: false,
            })?;

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                PollFailure::retry(LobbyError::Transport(format!("subscribe request failed: {e}")))
            })?;

        let status = response.status();
        let body = read_body(response, "subscribe").await.map_err(|error| PollFailure {
            error,
            retryable: is_transient(status),
        })?;
        decode_subscribe(&body).map_err(PollFailure::retry)
    }

    fn into_stream(self, cursor: Timetoken) -> BoxStream<'static, PresenceMessage> {
        stream::unfold((self, cursor), |(poll, cursor)| async move {
            match poll.poll(Some(&cursor)).await {
                Ok((next, messages)) => {
                    if !messages.is_empty() {
                        debug!(count = messages.len(), timetoken = next.t, "presence messages received");
                    }
                    Some((messages, (poll, next)))
                }
                Err(failure) if failure.retryable => {
                    warn!(
                        channel = poll.channel,
                        error = %failure.error,
                        retry_ms = poll.retry.as_millis(),
                        "subscribe long-poll failed, retrying"
                    );
                    tokio::time::sleep(poll.retry).await;
                    Some((Vec::new(), (poll, cursor)))
                }
                Err(failure) => {
                    warn!(channel = poll.channel, error = %failure.error, "subscribe rejected, ending stream");
                    None
                }
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Read a response body, turning a non-success status into an error that
/// carries the body text.
pub(crate) async fn read_body(
    response: reqwest::Response,
    operation: &str,
) -> Result<String, LobbyError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| LobbyError::Transport(format!("{operation} body read failed: {e}")))?;
    if !status.is_success() {
        return Err(LobbyError::Transport(format!(
            "{operation} returned {status}: {body}"
        )));
    }
    Ok(body)
}

// ---------------------------------------------------------------------------
// Wire decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SubscribeResponse {
    t: Timetoken,
    #[serde(default)]
    m: Vec<Envelope>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    /// Channel the message was published on.
    c: String,
    /// Payload.
    #[serde(default)]
    d: serde_json::Value,
}

/// Decode one subscribe response into the next cursor and the presence
/// messages it carried.
///
/// Payloads that do not decode as presence messages are skipped.
pub(crate) fn decode_subscribe(
    body: &str,
) -> Result<(Timetoken, Vec<PresenceMessage>), LobbyError> {
    let response: SubscribeResponse = serde_json::from_str(body)?;

    let messages = response
        .m
        .into_iter()
        .filter_map(|envelope| {
            if !envelope.c.ends_with(PRESENCE_SUFFIX) {
                debug!(channel = envelope.c, "ignoring non-presence message");
                return None;
            }
            match serde_json::from_value::<PresenceMessage>(envelope.d) {
                Ok(message) => Some(message),
                Err(e) => {
                    debug!(channel = envelope.c, error = %e, "undecodable presence payload");
                    None
                }
            }
        })
        .collect();

    Ok((response.t, messages))
}

#[derive(Debug, Deserialize)]
struct HereNowResponse {
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    occupancy: u32,
    #[serde(default)]
    uuids: Vec<HereNowEntry>,
}

/// `uuids` entries are bare strings without state and objects with it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HereNowEntry {
    Plain(String),
    Detailed {
        uuid: String,
        #[serde(default)]
        state: Option<serde_json::Value>,
    },
}

/// Decode a single-channel here-now response.
pub(crate) fn decode_here_now(body: &str) -> Result<HereNow, LobbyError> {
    let response: HereNowResponse = serde_json::from_str(body)?;

    if let Some(status) = response.status.filter(|s| *s != 200) {
        return Err(LobbyError::Transport(format!(
            "here_now status {status}: {}",
            response.message.as_deref().unwrap_or("no message")
        )));
    }

    let occupants = response
        .uuids
        .into_iter()
        .filter_map(|entry| {
            let (raw, state) = match entry {
                HereNowEntry::Plain(uuid) => (uuid, None),
                HereNowEntry::Detailed { uuid, state } => (uuid, state),
            };
            ParticipantId::new(raw).map(|identifier| Occupant { identifier, state })
        })
        .collect();

    Ok(HereNow {
        total_occupancy: response.occupancy,
        occupants,
    })
}
