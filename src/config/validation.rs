//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, ports valid)
//! - Check that the per-entry cache bound fits inside the aggregate bound
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than zero",
        ));
    }

    let cache = &config.cache;
    if cache.max_size == 0 {
        errors.push(ValidationError::new("cache.max_size", "must be greater than zero"));
    }
    if cache.max_element_size == 0 {
        errors.push(ValidationError::new(
            "cache.max_element_size",
            "must be greater than zero",
        ));
    } else if cache.max_element_size > cache.max_size {
        errors.push(ValidationError::new(
            "cache.max_element_size",
            format!(
                "{} exceeds cache.max_size ({})",
                cache.max_element_size, cache.max_size
            ),
        ));
    }

    if config.upstream.http_port == 0 {
        errors.push(ValidationError::new("upstream.http_port", "must not be zero"));
    }
    if config.upstream.tunnel_default_port == 0 {
        errors.push(ValidationError::new(
            "upstream.tunnel_default_port",
            "must not be zero",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
