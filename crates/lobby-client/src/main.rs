//! Lobby presence client entry point.
//!
//! Joins the shared lobby channel with presence, keeps a roster of who is
//! there, and serves that roster to a local UI through the observer API.
//!
//! # Architecture
//!
//! ```text
//! PubNub (subscribe + -pnpres) --> PresenceSession --> watch<RosterView> --> observer (HTTP/WS)
//! PubNub (here_now, every 2s)  -->
//! ```
//!
//! On Ctrl-C the session unsubscribes and sends an explicit leave so peers
//! drop this client at once.

mod endpoints;
mod leave;
mod pubnub;

use std::path::Path;
use std::sync::Arc;

use lobby_core::{LobbyConfig, PresenceSession, SessionSettings};
use lobby_observer::{AppState, ServerConfig};
use lobby_types::SessionId;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::pubnub::PubNubTransport;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "lobby-config.yaml";

/// Application entry point.
///
/// Loads configuration, initializes logging, then runs the presence
/// session until Ctrl-C.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the observer port cannot
/// be bound, or the transport cannot be constructed. Runtime transport
/// failures are logged, never returned.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path =
        std::env::var("LOBBY_CONFIG").unwrap_or_else(|_| String::from(DEFAULT_CONFIG_PATH));
    let path = Path::new(&config_path);
    let config = if path.exists() {
        LobbyConfig::from_file(path)?
    } else {
        LobbyConfig::parse("{}")?
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        config = config_path,
        from_file = path.exists(),
        channel = config.channel,
        origin = config.transport.origin,
        refresh_ms = config.presence.refresh_interval_ms,
        "lobby-client starting"
    );

    let session_id = config.uuid.map_or_else(SessionId::new, SessionId::from);
    info!(session_id = %session_id, "client session identifier");

    let transport = PubNubTransport::new(&config.transport, session_id)?;
    let notifier = transport.leave_notifier(config.presence.leave_timeout());
    let mut session = PresenceSession::new(
        session_id,
        SessionSettings::from_config(&config),
        transport,
        notifier,
    );

    let observer = if config.observer.enabled {
        let listener = lobby_observer::bind(&ServerConfig {
            host: config.observer.host.clone(),
            port: config.observer.port,
        })
        .await?;
        let state = Arc::new(AppState::new(session.subscribe_view()));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let stopped = async move {
                let _ = stop_rx.await;
            };
            if let Err(e) = lobby_observer::serve(listener, state, stopped).await {
                error!(error = %e, "observer server stopped");
            }
        });
        Some((stop_tx, handle))
    } else {
        None
    };

    session.run(shutdown_signal()).await;

    if let Some((stop_tx, handle)) = observer {
        let _ = stop_tx.send(());
        if let Err(e) = handle.await {
            warn!(error = %e, "observer task did not finish cleanly");
        }
    }
    info!(session_id = %session_id, "lobby-client stopped");
    Ok(())
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("ctrl-c received, leaving lobby"),
        Err(e) => {
            warn!(error = %e, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
