//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CLI port argument ─┐
//! TOML document ─────┼→ schema.rs (ProxyConfig, serde defaults)
//!                    → validation.rs (semantic checks)
//!                    → ProxyConfig (validated, immutable)
//!                    → copied into the listener, cache and per-connection context
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod constants;
pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::CacheConfig;
pub use schema::ListenerConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::ProxyConfig;
pub use schema::TimeoutConfig;
pub use schema::UpstreamConfig;
