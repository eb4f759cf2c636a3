//! Accept loop and per-connection handling.
//!
//! # Responsibilities
//! - Accept admitted connections and run each one on its own task
//! - Classify the request and dispatch to the tunnel, cache or forwarder
//! - Log every failure by kind; never answer a failure on the wire
//!
//! # Data Flow
//! ```text
//! Listener::accept (permit held)
//!     → read request line → classify
//!         CONNECT → skip headers → proxy::tunnel
//!         GET     → cache lookup
//!                       hit  → write cached payload
//!                       miss → proxy::forward
//!                   → close write side → discard client bytes
//!         other   → close
//! ```
//!
//! # Design Decisions
//! - One task per connection; the permit moves into the task and is
//!   released when the task ends, however it ends
//! - The cache lock is never held across network I/O

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::cache::CacheStore;
use crate::config::constants::CLIENT_LINGER;
use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::http::request::{self, Request};
use crate::lifecycle::ShutdownSignal;
use crate::net::{
    ConnectionGuard, ConnectionPermit, ConnectionState, ConnectionTracker, Listener, ListenerError,
};
use crate::observability::metrics;
use crate::proxy::{forward, tunnel, ProxyContext};
use crate::resilience::timeouts::with_deadline;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// The forward proxy server.
#[derive(Debug, Clone)]
pub struct ProxyServer {
    context: ProxyContext,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    /// Create a server with an empty cache sized by `config`.
    pub fn new(config: &ProxyConfig) -> Self {
        Self::with_cache(config, Arc::new(CacheStore::new(config.cache)))
    }

    /// Create a server around an existing cache.
    pub fn with_cache(config: &ProxyConfig, cache: Arc<CacheStore>) -> Self {
        Self {
            context: ProxyContext::new(config, cache),
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.context.cache
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept connections until `shutdown` fires or the permit pool closes.
    ///
    /// Connections already accepted keep running after this returns.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: ShutdownSignal,
    ) -> std::result::Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Proxy server starting");
        }

        loop {
            let accepted = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => accepted,
            };

            let (stream, peer, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(ListenerError::Accept(e)) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let guard = self.tracker.track();
            let context = self.context.clone();
            tokio::spawn(serve_connection(stream, peer, permit, guard, context));
        }

        tracing::info!(
            active_connections = self.tracker.active_count(),
            "Proxy server stopped accepting"
        );
        Ok(())
    }
}

#[tracing::instrument(
    name = "connection",
    skip_all,
    fields(peer = %peer, id = %guard.id())
)]
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    _permit: ConnectionPermit,
    mut guard: ConnectionGuard,
    context: ProxyContext,
) {
    tracing::debug!("Connection admitted");

    match handle_connection(stream, &context, &mut guard).await {
        Ok(()) => tracing::debug!(state = ?guard.state(), "Connection finished"),
        Err(e @ (ProxyError::MalformedRequest(_) | ProxyError::UnsupportedMethod(_))) => {
            metrics::record_request("rejected");
            tracing::warn!(error = %e, kind = e.kind(), "Request rejected");
        }
        Err(e @ ProxyError::Connect { .. }) => {
            tracing::error!(error = %e, kind = e.kind(), "Outbound connection failed");
        }
        Err(e @ ProxyError::Io(_)) => {
            tracing::debug!(
                error = %e,
                kind = e.kind(),
                state = ?guard.state(),
                "Client connection ended"
            );
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    context: &ProxyContext,
    guard: &mut ConnectionGuard,
) -> Result<()> {
    let idle = context.timeouts.idle();
    let mut reader = BufReader::new(stream);

    let Some(line) = request::read_request_line(&mut reader, idle).await? else {
        tracing::debug!("Empty request, closing");
        return Ok(());
    };

    match request::classify(&line)? {
        Request::Connect { authority } => {
            request::skip_headers(&mut reader, idle).await?;
            metrics::record_request("connect");
            tracing::info!(authority = %authority, "CONNECT");

            guard.transition(ConnectionState::Tunneling);
            tunnel::tunnel(reader, &authority, context).await?;
        }
        Request::Get { target, version } => {
            metrics::record_request("get");

            serve_get(reader.get_mut(), &target, &version, context, guard).await?;
            let _ = reader.get_mut().shutdown().await;

            let dropped = request::discard_remaining(&mut reader, CLIENT_LINGER).await;
            tracing::trace!(bytes = dropped, "Discarded client request remainder");
        }
    }

    Ok(())
}

async fn serve_get(
    client: &mut TcpStream,
    target: &str,
    version: &str,
    context: &ProxyContext,
    guard: &mut ConnectionGuard,
) -> Result<()> {
    guard.transition(ConnectionState::CacheLookup);

    if let Some(payload) = context.cache.lookup(target) {
        tracing::info!(url = %target, bytes = payload.len(), "Cache hit");
        guard.transition(ConnectionState::RespondingFromCache);
        with_deadline(context.timeouts.idle(), client.write_all(&payload)).await?;
        return Ok(());
    }

    tracing::info!(url = %target, "Cache miss");
    let outcome = forward::forward(client, target, version, context, guard).await?;
    tracing::debug!(url = %target, outcome = ?outcome, "Forward finished");
    Ok(())
}
