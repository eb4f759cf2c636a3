//! CONNECT tunnel relay.
//!
//! # Responsibilities
//! - Resolve the CONNECT authority to host and port
//! - Open the outbound connection and acknowledge the client
//! - Relay opaque bytes in both directions until both sides finish
//!
//! # Design Decisions
//! - Each direction is its own task; the tunnel ends when both have ended
//! - EOF and I/O errors both end a direction normally; neither is reported
//! - A finished direction half-closes its destination so the peer can drain
//! - The idle deadline applies to the tunnel as a whole: a quiet direction
//!   stays open while the other one is moving bytes

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::config::constants::MAX_BYTES;
use crate::error::{ProxyError, Result};
use crate::observability::metrics;
use crate::proxy::ProxyContext;
use crate::resilience::timeouts::{self, with_deadline};

/// Sent to the client once the outbound connection is open.
pub const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

/// Bytes relayed over a tunnel's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TunnelStats {
    /// Client to remote, including bytes pipelined behind the CONNECT head.
    pub upstream: u64,
    /// Remote to client.
    pub downstream: u64,
}

/// Split a CONNECT authority into host and port.
///
/// `host`, `host:port` and `[v6]:port` are accepted; a missing port
/// becomes `default_port`.
pub fn parse_authority(authority: &str, default_port: u16) -> Result<(String, u16)> {
    let malformed =
        || ProxyError::MalformedRequest(format!("invalid CONNECT target '{}'", authority));

    let (host, port) = match authority.strip_prefix('[') {
        Some(bracketed) => {
            let (host, rest) = bracketed.split_once(']').ok_or_else(malformed)?;
            if rest.is_empty() {
                (host, None)
            } else {
                (host, Some(rest.strip_prefix(':').ok_or_else(malformed)?))
            }
        }
        None => match authority.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        },
    };

    if host.is_empty() {
        return Err(malformed());
    }

    let port = match port {
        Some(port) => port
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(malformed)?,
        None => default_port,
    };

    Ok((host.to_string(), port))
}

/// Open a tunnel to `authority` and relay until both directions end.
///
/// `client` still holds whatever the client sent after the CONNECT head;
/// those bytes reach the remote before anything else.
pub async fn tunnel(
    client: BufReader<TcpStream>,
    authority: &str,
    ctx: &ProxyContext,
) -> Result<TunnelStats> {
    let (host, port) = parse_authority(authority, ctx.upstream.tunnel_default_port)?;

    let remote = timeouts::connect(&host, port, ctx.timeouts.connect())
        .await
        .map_err(|source| ProxyError::Connect {
            target: format!("{}:{}", host, port),
            source,
        })?;

    let pending = client.buffer().to_vec();
    let mut client = client.into_inner();
    client.write_all(CONNECTION_ESTABLISHED).await?;
    client.flush().await?;

    tracing::info!(host = %host, port, "Tunnel established");

    let stats = relay(client, remote, &pending, ctx.timeouts.idle()).await;
    metrics::record_tunnel_bytes(stats.upstream, stats.downstream);

    tracing::info!(
        host = %host,
        port,
        bytes_up = stats.upstream,
        bytes_down = stats.downstream,
        "Tunnel closed"
    );
    Ok(stats)
}

/// Relay between two connected sockets until both directions have ended.
///
/// `pending` is written to `remote` before the client side is read.
pub async fn relay(
    client: TcpStream,
    remote: TcpStream,
    pending: &[u8],
    idle: Option<Duration>,
) -> TunnelStats {
    let (client_read, client_write) = client.into_split();
    let (remote_read, mut remote_write) = remote.into_split();

    let mut stats = TunnelStats::default();
    if !pending.is_empty() {
        match with_deadline(idle, remote_write.write_all(pending)).await {
            Ok(()) => stats.upstream = pending.len() as u64,
            Err(e) => tracing::debug!(error = %e, "Failed to forward pipelined bytes"),
        }
    }

    let activity = Arc::new(AtomicU64::new(0));
    let up = tokio::spawn(pump(client_read, remote_write, idle, Arc::clone(&activity)));
    let down = tokio::spawn(pump(remote_read, client_write, idle, activity));

    let (up, down) = tokio::join!(up, down);
    stats.upstream += up.unwrap_or(0);
    stats.downstream = down.unwrap_or(0);
    stats
}

/// Copy `src` into `dst` until EOF, error, or tunnel-wide silence.
async fn pump<R, W>(mut src: R, mut dst: W, idle: Option<Duration>, activity: Arc<AtomicU64>) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; MAX_BYTES];
    let mut total = 0u64;

    loop {
        let seen = activity.load(Ordering::Relaxed);
        let n = match with_deadline(idle, src.read(&mut buf)).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e)
                if e.kind() == io::ErrorKind::TimedOut
                    && activity.load(Ordering::Relaxed) != seen =>
            {
                continue
            }
            Err(e) => {
                tracing::debug!(error = %e, bytes = total, "Relay direction ended");
                break;
            }
        };

        if let Err(e) = with_deadline(idle, dst.write_all(&buf[..n])).await {
            tracing::debug!(error = %e, bytes = total, "Relay destination closed");
            break;
        }
        total += n as u64;
        activity.fetch_add(1, Ordering::Relaxed);
    }

    let _ = dst.shutdown().await;
    total
}
