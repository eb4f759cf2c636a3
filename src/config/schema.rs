//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::constants::{
    DEFAULT_ORIGIN_PORT, DEFAULT_PORT, DEFAULT_TUNNEL_PORT, MAX_CLIENTS, MAX_ELEMENT_SIZE,
    MAX_SIZE,
};

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, admission limit).
    pub listener: ListenerConfig,

    /// Response cache bounds.
    pub cache: CacheConfig,

    /// Outbound connection settings.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Default configuration listening on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        let mut config = Self::default();
        config.listener.bind_address = format!("0.0.0.0:{}", port);
        config
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum connections processed concurrently (admission permits).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_connections: MAX_CLIENTS,
        }
    }
}

/// Cache size bounds, in bytes.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on the sum of all entry sizes.
    pub max_size: usize,

    /// Entries larger than this are never stored.
    pub max_element_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: MAX_SIZE,
            max_element_size: MAX_ELEMENT_SIZE,
        }
    }
}

/// Outbound connection settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Port dialed for every forwarded GET, regardless of the URL.
    pub http_port: u16,

    /// Port used for CONNECT targets that do not name one.
    pub tunnel_default_port: u16,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_ORIGIN_PORT,
            tunnel_default_port: DEFAULT_TUNNEL_PORT,
        }
    }
}

/// Timeout configuration. A value of zero disables the deadline.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Outbound connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Longest silence tolerated on a client, origin or tunnel read, in seconds.
    pub idle_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Option<Duration> {
        (self.connect_secs > 0).then(|| Duration::from_secs(self.connect_secs))
    }

    pub fn idle(&self) -> Option<Duration> {
        (self.idle_secs > 0).then(|| Duration::from_secs(self.idle_secs))
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            idle_secs: 300,
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}
