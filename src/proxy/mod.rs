//! Outbound side of the proxy.
//!
//! # Data Flow
//! ```text
//! GET miss → forward.rs → origin:http_port → client (+ capture → cache)
//! CONNECT  → tunnel.rs  → target:port ⇄ client (opaque bytes)
//! ```
//!
//! # Design Decisions
//! - One fresh outbound connection per request; nothing is pooled
//! - Outbound failures end only the connection that caused them

pub mod forward;
pub mod tunnel;

use std::sync::Arc;

use crate::cache::CacheStore;
use crate::config::{ProxyConfig, TimeoutConfig, UpstreamConfig};

/// State shared by every connection handler.
#[derive(Debug, Clone)]
pub struct ProxyContext {
    pub cache: Arc<CacheStore>,
    pub upstream: UpstreamConfig,
    pub timeouts: TimeoutConfig,
}

impl ProxyContext {
    pub fn new(config: &ProxyConfig, cache: Arc<CacheStore>) -> Self {
        Self {
            cache,
            upstream: config.upstream,
            timeouts: config.timeouts,
        }
    }
}
