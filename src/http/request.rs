//! Request line reading and classification.
//!
//! # Responsibilities
//! - Read the request line from the client stream
//! - Classify it as CONNECT, GET, or reject it
//! - Consume a CONNECT header block, leaving pipelined bytes buffered
//! - Discard whatever a GET client sent after its request line
//!
//! # Design Decisions
//! - Only the request line is interpreted; client headers are discarded
//! - A GET is dispatched as soon as its request line arrives; its header
//!   block is never parsed, so its size and length cannot reject it
//! - CONNECT header lines are bounded in length and count before they are
//!   buffered
//! - Rejections never produce a response

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::config::constants::{MAX_HEADER_LINES, MAX_LINE_LENGTH, MAX_REQUEST_LINE_LENGTH};
use crate::error::{ProxyError, Result};
use crate::resilience::timeouts::with_deadline;

/// A request the proxy knows how to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `CONNECT host[:port] version`
    Connect { authority: String },
    /// `GET absolute-url version`
    Get { target: String, version: String },
}

/// Classify a request line.
///
/// A line whose first token is `CONNECT` needs only its authority. Any
/// other line must carry method, target and version, and only `GET` is
/// accepted.
pub fn classify(line: &str) -> Result<Request> {
    let mut tokens = line.split_whitespace();
    let method = tokens
        .next()
        .ok_or_else(|| ProxyError::MalformedRequest("empty request line".into()))?;

    if method == "CONNECT" {
        let authority = tokens.next().ok_or_else(|| {
            ProxyError::MalformedRequest(format!("CONNECT without target: '{}'", line))
        })?;
        return Ok(Request::Connect {
            authority: authority.to_string(),
        });
    }

    let (target, version) = match (tokens.next(), tokens.next()) {
        (Some(target), Some(version)) => (target, version),
        _ => {
            return Err(ProxyError::MalformedRequest(format!(
                "expected method, target and version: '{}'",
                line
            )))
        }
    };

    if method != "GET" {
        return Err(ProxyError::UnsupportedMethod(method.to_string()));
    }

    Ok(Request::Get {
        target: target.to_string(),
        version: version.to_string(),
    })
}

/// Read one line of at most `limit` bytes, without its terminator. `None`
/// at end of stream.
async fn read_line<R>(
    reader: &mut R,
    limit: usize,
    idle: Option<Duration>,
) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    let mut limited = (&mut *reader).take(limit as u64);
    let n = with_deadline(idle, limited.read_until(b'\n', &mut raw)).await?;

    if n == 0 {
        return Ok(None);
    }
    if n == limit && raw.last() != Some(&b'\n') {
        return Err(ProxyError::MalformedRequest(format!(
            "line longer than {} bytes",
            limit
        )));
    }

    let line = String::from_utf8(raw)
        .map_err(|_| ProxyError::MalformedRequest("line is not valid UTF-8".into()))?;
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Read the request line. `None` when the client sent nothing or an empty line.
pub async fn read_request_line<R>(reader: &mut R, idle: Option<Duration>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    match read_line(reader, MAX_REQUEST_LINE_LENGTH, idle).await? {
        Some(line) if !line.trim().is_empty() => Ok(Some(line)),
        _ => Ok(None),
    }
}

/// Consume header lines up to and including the blank line that ends them.
///
/// Returns the number of header lines skipped. End of stream also ends the
/// block.
pub async fn skip_headers<R>(reader: &mut R, idle: Option<Duration>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    for count in 0..=MAX_HEADER_LINES {
        match read_line(reader, MAX_LINE_LENGTH, idle).await? {
            Some(line) if !line.is_empty() => continue,
            _ => return Ok(count),
        }
    }

    Err(ProxyError::MalformedRequest(format!(
        "more than {} header lines",
        MAX_HEADER_LINES
    )))
}

/// Read and drop client bytes until end of stream or until `linger`
/// passes. Returns the number of bytes dropped.
///
/// Read errors end the discard quietly; the exchange is already over.
pub async fn discard_remaining<R>(reader: &mut R, linger: Duration) -> u64
where
    R: AsyncBufRead + Unpin,
{
    let mut dropped = 0u64;
    let _ = tokio::time::timeout(linger, async {
        loop {
            let n = match reader.fill_buf().await {
                Ok([]) | Err(_) => break,
                Ok(buf) => buf.len(),
            };
            reader.consume(n);
            dropped += n as u64;
        }
    })
    .await;
    dropped
}
