//! Origin forwarding for GET cache misses.
//!
//! # Responsibilities
//! - Derive origin host and path from the absolute request target
//! - Send a synthesized request that replaces the client's headers
//! - Stream the origin's bytes to the client as they arrive
//! - Hand a complete, cache-eligible response to the cache
//!
//! # Design Decisions
//! - The origin is always dialed on the configured HTTP port; a port in
//!   the URL is kept in the Host header but never dialed
//! - The response is relayed verbatim with no framing awareness; origin
//!   EOF is the only end-of-response signal
//! - Capture stops as soon as the response can no longer fit in the cache

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::cache::{CacheEntry, InsertOutcome};
use crate::config::constants::MAX_BYTES;
use crate::error::{ProxyError, Result};
use crate::net::{ConnectionGuard, ConnectionState};
use crate::proxy::ProxyContext;
use crate::resilience::timeouts::{self, with_deadline};

/// Host and path derived from an absolute-form GET target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginRequest {
    host: String,
    path: String,
}

impl OriginRequest {
    /// Split `scheme://authority/path` into authority and path.
    ///
    /// The path defaults to `/`. A target without a scheme prefix is taken
    /// as authority and path directly.
    pub fn from_target(target: &str) -> Result<Self> {
        let rest = target
            .strip_prefix("http://")
            .or_else(|| target.strip_prefix("https://"))
            .unwrap_or(target);

        let (host, path) = match rest.find('/') {
            Some(index) => rest.split_at(index),
            None => (rest, "/"),
        };

        if host.is_empty() {
            return Err(ProxyError::MalformedRequest(format!(
                "no host in request target '{}'",
                target
            )));
        }

        Ok(Self {
            host: host.to_string(),
            path: path.to_string(),
        })
    }

    /// Authority as written in the URL, used for the Host header.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Host name to resolve: the authority without brackets or port.
    pub fn dial_host(&self) -> &str {
        let host = self.host.as_str();
        if let Some(bracketed) = host.strip_prefix('[') {
            return bracketed.split(']').next().unwrap_or(bracketed);
        }
        match host.rsplit_once(':') {
            Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
            _ => host,
        }
    }

    /// The request sent to the origin.
    pub fn to_wire(&self, version: &str) -> String {
        format!(
            "GET {} {}\r\nHost: {}\r\nConnection: close\r\n\r\n",
            self.path, version, self.host
        )
    }
}

/// Why a completed response was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The origin closed without sending anything.
    Empty,
    /// The response outgrew the per-entry bound.
    Oversize,
}

/// How a forwarded exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The origin closed cleanly and the response was stored.
    Cached { bytes: u64, evicted: usize },
    /// The origin closed cleanly but the response was not stored.
    NotCached { bytes: u64, reason: SkipReason },
    /// The exchange broke off before the origin closed; nothing was stored.
    Incomplete { bytes: u64 },
}

impl ForwardOutcome {
    /// Bytes delivered to the client.
    pub fn bytes(&self) -> u64 {
        match self {
            ForwardOutcome::Cached { bytes, .. }
            | ForwardOutcome::NotCached { bytes, .. }
            | ForwardOutcome::Incomplete { bytes } => *bytes,
        }
    }
}

/// Fetch `target` from its origin, relaying the response to `client`.
///
/// Only an unreachable origin is an error. Failures once bytes are flowing
/// end the exchange with [`ForwardOutcome::Incomplete`].
pub async fn forward<C>(
    client: &mut C,
    target: &str,
    version: &str,
    ctx: &ProxyContext,
    guard: &mut ConnectionGuard,
) -> Result<ForwardOutcome>
where
    C: AsyncWrite + Unpin,
{
    let request = OriginRequest::from_target(target)?;
    let dial_host = request.dial_host();
    let port = ctx.upstream.http_port;

    let mut origin = timeouts::connect(dial_host, port, ctx.timeouts.connect())
        .await
        .map_err(|source| ProxyError::Connect {
            target: format!("{}:{}", dial_host, port),
            source,
        })?;

    guard.transition(ConnectionState::Forwarding);
    tracing::debug!(host = %request.host(), path = %request.path(), port, "Forwarding to origin");

    if let Err(e) = origin.write_all(request.to_wire(version).as_bytes()).await {
        tracing::debug!(error = %e, "Origin closed before request was sent");
        return Ok(ForwardOutcome::Incomplete { bytes: 0 });
    }

    let idle = ctx.timeouts.idle();
    let mut buf = vec![0u8; MAX_BYTES];
    let mut capture = Some(BytesMut::new());
    let mut bytes = 0u64;

    loop {
        let n = match with_deadline(idle, origin.read(&mut buf)).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, bytes, "Origin read ended early");
                return Ok(ForwardOutcome::Incomplete { bytes });
            }
        };
        let chunk = &buf[..n];

        if let Err(e) = with_deadline(idle, client.write_all(chunk)).await {
            tracing::debug!(error = %e, bytes, "Client stopped receiving");
            return Ok(ForwardOutcome::Incomplete { bytes });
        }
        bytes += n as u64;

        if let Some(mut captured) = capture.take() {
            let size = CacheEntry::size_of(target, captured.len() + n);
            if ctx.cache.is_cacheable(size) {
                captured.extend_from_slice(chunk);
                capture = Some(captured);
            } else {
                tracing::debug!(url = %target, size, "Response too large to cache, streaming only");
            }
        }
    }

    guard.transition(ConnectionState::Caching);

    let captured = match capture {
        Some(captured) if !captured.is_empty() => captured,
        Some(_) => {
            return Ok(ForwardOutcome::NotCached {
                bytes,
                reason: SkipReason::Empty,
            })
        }
        None => {
            return Ok(ForwardOutcome::NotCached {
                bytes,
                reason: SkipReason::Oversize,
            })
        }
    };

    match ctx.cache.insert(target, captured.freeze()) {
        InsertOutcome::Stored { evicted, .. } => {
            tracing::info!(url = %target, bytes, evicted = evicted.len(), "Response cached");
            Ok(ForwardOutcome::Cached {
                bytes,
                evicted: evicted.len(),
            })
        }
        InsertOutcome::Oversize { size } => {
            tracing::debug!(url = %target, size, "Response too large to cache");
            Ok(ForwardOutcome::NotCached {
                bytes,
                reason: SkipReason::Oversize,
            })
        }
    }
}
