//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (admission permit, then accept)
//!     → connection.rs (lifecycle tracking, state machine)
//!     → Hand off to http::server
//! ```
//!
//! # Design Decisions
//! - Bounded admission prevents resource exhaustion; excess waits in the OS backlog
//! - Each connection is tracked from admission to close

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionState, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
