//! Caching forward proxy library.
//!
//! Admits a bounded number of clients, serves `GET` requests for absolute
//! URLs from an in-memory cache or the origin, and relays `CONNECT`
//! tunnels byte for byte.

// Core subsystems
pub mod cache;
pub mod config;
pub mod http;
pub mod net;
pub mod proxy;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use cache::CacheStore;
pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
