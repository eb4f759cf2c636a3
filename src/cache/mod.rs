//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! GET request
//!     → store.rs lookup(target)
//!         hit  → payload written to client
//!         miss → proxy::forward fetches from origin
//!              → store.rs insert(target, response bytes)
//!                  → evict least-recently-accessed until it fits
//! ```
//!
//! # Invariants
//! - Aggregate size never exceeds `max_size` after an operation completes
//! - No entry exceeds `max_element_size`
//! - At most one entry per key

pub mod stats;
pub mod store;


pub use stats::CacheStats;
pub use store::{CacheEntry, CacheStore, InsertOutcome};
