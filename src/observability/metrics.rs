//! Metrics collection.
//!
//! # Metrics
//! - `proxy_connections_total` (counter): connections past admission
//! - `proxy_connections_active` (gauge): current connection count
//! - `proxy_requests_total` (counter): requests by kind (get, connect, rejected)
//! - `proxy_cache_lookups_total` (counter): lookups by outcome (hit, miss)
//! - `proxy_cache_evictions_total` (counter)
//! - `proxy_cache_size_bytes` (gauge): aggregate cache size
//! - `proxy_tunnel_bytes_total` (counter): relayed bytes by direction
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call is a no-op.

use metrics::{counter, gauge};

pub fn record_connection_opened(active: u64) {
    counter!("proxy_connections_total").increment(1);
    gauge!("proxy_connections_active").set(active as f64);
}

pub fn record_connection_closed(active: u64) {
    gauge!("proxy_connections_active").set(active as f64);
}

/// `kind` is one of `get`, `connect`, `rejected`.
pub fn record_request(kind: &'static str) {
    counter!("proxy_requests_total", "kind" => kind).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!("proxy_cache_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_evictions(count: usize) {
    if count > 0 {
        counter!("proxy_cache_evictions_total").increment(count as u64);
    }
}

pub fn record_cache_size(bytes: usize) {
    gauge!("proxy_cache_size_bytes").set(bytes as f64);
}

pub fn record_tunnel_bytes(upstream: u64, downstream: u64) {
    counter!("proxy_tunnel_bytes_total", "direction" => "upstream").increment(upstream);
    counter!("proxy_tunnel_bytes_total", "direction" => "downstream").increment(downstream);
}
