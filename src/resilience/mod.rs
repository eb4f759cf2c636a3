//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound dial (origin or tunnel target):
//!     → timeouts.rs (connect deadline)
//! Every read from client, origin or tunnel peer:
//!     → timeouts.rs (idle deadline)
//! ```
//!
//! # Design Decisions
//! - No operation is retried; a failure is final for its connection
//! - Deadlines are the only cancellation mechanism, and they are per connection

pub mod timeouts;
