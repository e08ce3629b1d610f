//! URL construction for the PubNub REST presence API.
//!
//! All URLs are built from the configured origin with
//! [`Url::path_segments_mut`](reqwest::Url::path_segments_mut) and
//! [`Url::query_pairs_mut`](reqwest::Url::query_pairs_mut), so channel
//! names and identifiers are always percent-encoded.

use lobby_core::LobbyError;
use lobby_core::config::TransportConfig;
use reqwest::Url;

/// Suffix of the companion channel that carries presence events.
pub const PRESENCE_SUFFIX: &str = "-pnpres";

/// Subscribe cursor returned by every long-poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct Timetoken {
    /// Timetoken, as a decimal string.
    pub t: String,
    /// Region the timetoken was issued in.
    #[serde(default)]
    pub r: u32,
}

/// Builds request URLs for one keyset.
#[derive(Debug, Clone)]
pub struct Endpoints {
    origin: Url,
    subscribe_key: String,
    heartbeat_secs: u32,
}

impl Endpoints {
    /// Validate the origin and capture the keyset.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Config`] if the origin is not an absolute
    /// `http(s)` URL.
    pub fn new(transport: &TransportConfig) -> Result<Self, LobbyError> {
        let origin = Url::parse(&transport.origin)
            .map_err(|e| LobbyError::Config(format!("invalid origin {}: {e}", transport.origin)))?;
        if !matches!(origin.scheme(), "http" | "https") || origin.cannot_be_a_base() {
            return Err(LobbyError::Config(format!(
                "origin must be an http(s) base URL, got {}",
                transport.origin
            )));
        }
        Ok(Self {
            origin,
            subscribe_key: transport.subscribe_key.clone(),
            heartbeat_secs: transport.heartbeat_secs,
        })
    }

    /// Long-poll subscribe on `channel` and its presence companion.
    ///
    /// `GET /v2/subscribe/{sub_key}/{channel},{channel}-pnpres/0`
    ///
    /// A `None` cursor is the handshake request (`tt=0`).
    pub fn subscribe_url(
        &self,
        channel: &str,
        uuid: &str,
        cursor: Option<&Timetoken>,
    ) -> Result<Url, LobbyError> {
        let channels = format!("{channel},{channel}{PRESENCE_SUFFIX}");
        let mut url = self.with_path(&["v2", "subscribe", &self.subscribe_key, &channels, "0"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("uuid", uuid);
            match cursor {
                Some(tt) => {
                    query.append_pair("tt", &tt.t);
                    query.append_pair("tr", &tt.r.to_string());
                }
                None => {
                    query.append_pair("tt", "0");
                }
            }
            query.append_pair("heartbeat", &self.heartbeat_secs.to_string());
        }
        Ok(url)
    }

    /// Here-now for one channel, with identifiers and state.
    ///
    /// `GET /v2/presence/sub-key/{sub_key}/channel/{channel}`
    pub fn here_now_url(&self, channel: &str, uuid: &str) -> Result<Url, LobbyError> {
        let mut url = self.with_path(&[
            "v2",
            "presence",
            "sub-key",
            &self.subscribe_key,
            "channel",
            channel,
        ])?;
        url.query_pairs_mut()
            .append_pair("uuid", uuid)
            .append_pair("state", "1")
            .append_pair("disable_uuids", "0");
        Ok(url)
    }

    /// Presence leave for `uuid` on one channel.
    ///
    /// `GET /v2/presence/sub-key/{sub_key}/channel/{channel}/leave`
    pub fn leave_url(&self, channel: &str, uuid: &str) -> Result<Url, LobbyError> {
        let mut url = self.with_path(&[
            "v2",
            "presence",
            "sub-key",
            &self.subscribe_key,
            "channel",
            channel,
            "leave",
        ])?;
        url.query_pairs_mut().append_pair("uuid", uuid);
        Ok(url)
    }

    fn with_path(&self, segments: &[&str]) -> Result<Url, LobbyError> {
        let mut url = self.origin.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|()| LobbyError::Config(format!("origin {} cannot take a path", self.origin)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
