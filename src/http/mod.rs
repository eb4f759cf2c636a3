//! HTTP/1.x handling on the client side of the proxy.
//!
//! # Data Flow
//! ```text
//! Admitted TCP connection
//!     → server.rs (per-connection task, dispatch)
//!     → request.rs (request line, classification, header block)
//!     → proxy::tunnel | cache hit | proxy::forward
//! ```
//!
//! `parse.rs` decomposes whole requests for tooling and tests; the serving
//! path does not depend on it.

pub mod parse;
pub mod request;
pub mod server;

pub use parse::{ParseError, ParsedHeader, ParsedRequest};
pub use request::Request;
pub use server::ProxyServer;
