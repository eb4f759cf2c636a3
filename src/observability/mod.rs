//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - Connection ID flows through all log events of a connection
//! - Metrics are cheap (atomic increments) and recorder-agnostic

pub mod logging;
pub mod metrics;
