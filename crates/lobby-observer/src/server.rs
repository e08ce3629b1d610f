//! Observer server lifecycle.
//!
//! Binding and serving are separate steps. The client binds before the
//! presence session starts, so a port clash fails startup instead of
//! surfacing later in a background task, and it stops the server through
//! a shutdown future once the session has left the channel.

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Where the observer listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host name or address to bind (e.g. `127.0.0.1`).
    pub host: String,
    /// TCP port; `0` picks a free one.
    pub port: u16,
}

/// Bind the observer listener.
///
/// # Errors
///
/// [`ServerError::Bind`] if the host does not resolve or the port is taken.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ServerError::Bind {
            host: config.host.clone(),
            port: config.port,
            source,
        })
}

/// Serve roster requests on `listener` until `shutdown` completes.
///
/// Open connections are drained before this returns.
///
/// # Errors
///
/// [`ServerError::Serve`] on a fatal listener error.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let addr = listener.local_addr().map_err(ServerError::Serve)?;
    info!(%addr, "observer listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)?;

    info!(%addr, "observer stopped");
    Ok(())
}

/// Observer server failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("cannot bind observer to {host}:{port}: {source}")]
    Bind {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Underlying socket error.
        source: io::Error,
    },

    /// The listener failed while serving.
    #[error("observer server failed: {0}")]
    Serve(#[source] io::Error),
}
