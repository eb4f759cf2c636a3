//! Cache statistics snapshot.

/// Counters and occupancy of a [`CacheStore`](super::CacheStore) at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    /// Inserts declined because the entry exceeded the per-entry bound.
    pub oversize_skips: u64,
    pub entries: usize,
    /// Aggregate size of all entries, in bytes.
    pub size_bytes: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0.0 when there were none.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
