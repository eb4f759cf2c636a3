//! Per-connection failure taxonomy.
//!
//! None of these errors is ever reported on the wire: every failure ends
//! with the client connection closed and the event logged.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Request line or header block could not be understood.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Method other than GET or CONNECT.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// Origin or tunnel target could not be reached.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Client socket failed outside of a relay loop.
    #[error("client I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProxyError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MalformedRequest(_) => "malformed_request",
            ProxyError::UnsupportedMethod(_) => "unsupported_method",
            ProxyError::Connect { .. } => "connect_failure",
            ProxyError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
