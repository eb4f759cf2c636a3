//! In-memory response store with size-bounded, least-recently-accessed eviction.
//!
//! Entries live in a single `VecDeque`, newest insert at the front. Access
//! recency is tracked only through a per-store logical clock stamped on the
//! entry; a hit never moves an entry. Every operation runs under one mutex
//! that is never held across an `.await`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::cache::CacheStats;
use crate::config::CacheConfig;
use crate::observability::metrics;

/// One cached response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Request target exactly as received, case-sensitive and unnormalized.
    key: String,
    payload: Bytes,
    size: usize,
    /// Logical access time; larger is more recent.
    last_access: u64,
}

impl CacheEntry {
    /// Accounted size of an entry: payload plus key plus one.
    pub fn size_of(key: &str, payload_len: usize) -> usize {
        payload_len + key.len() + 1
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn last_access(&self) -> u64 {
        self.last_access
    }
}

/// Result of [`CacheStore::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The entry was stored.
    Stored {
        /// Keys evicted to make room, oldest first.
        evicted: Vec<String>,
        /// An entry under the same key was replaced.
        replaced: bool,
    },
    /// The entry exceeds the per-entry bound and was not stored.
    Oversize { size: usize },
}

#[derive(Debug, Default)]
struct Inner {
    entries: VecDeque<CacheEntry>,
    total_size: usize,
    clock: u64,
    hits: u64,
    misses: u64,
    insertions: u64,
    evictions: u64,
    oversize_skips: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == key)
    }

    fn remove_at(&mut self, index: usize) -> Option<CacheEntry> {
        let entry = self.entries.remove(index)?;
        self.total_size -= entry.size;
        Some(entry)
    }

    /// Unlink the entry with the smallest access time. Ties go to the
    /// entry met first in traversal order.
    fn evict_oldest(&mut self) -> Option<CacheEntry> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(index, _)| index)?;
        let entry = self.remove_at(index)?;
        self.evictions += 1;
        Some(entry)
    }
}

/// Shared response cache keyed by request target.
#[derive(Debug)]
pub struct CacheStore {
    limits: CacheConfig,
    inner: Mutex<Inner>,
}

impl CacheStore {
    /// Create an empty store bounded by `limits`.
    pub fn new(limits: CacheConfig) -> Self {
        Self {
            limits,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every mutation leaves Inner consistent before any call that can panic.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether an entry of `size` bytes may be stored at all.
    pub fn is_cacheable(&self, size: usize) -> bool {
        size <= self.limits.max_element_size && size <= self.limits.max_size
    }

    /// Look up `key`, refreshing its access time on a hit.
    pub fn lookup(&self, key: &str) -> Option<Bytes> {
        let mut inner = self.lock();
        let found = match inner.position(key) {
            Some(index) => {
                let now = inner.tick();
                let entry = &mut inner.entries[index];
                entry.last_access = now;
                let payload = entry.payload.clone();
                inner.hits += 1;
                Some(payload)
            }
            None => {
                inner.misses += 1;
                None
            }
        };
        drop(inner);

        metrics::record_cache_lookup(found.is_some());
        found
    }

    /// Presence check that leaves access times and counters untouched.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().position(key).is_some()
    }

    /// Store `payload` under `key`, evicting least-recently-accessed
    /// entries until it fits.
    ///
    /// An existing entry under the same key is replaced, so a key maps to
    /// at most one entry.
    pub fn insert(&self, key: &str, payload: Bytes) -> InsertOutcome {
        let size = CacheEntry::size_of(key, payload.len());
        let mut inner = self.lock();

        if !self.is_cacheable(size) {
            inner.oversize_skips += 1;
            return InsertOutcome::Oversize { size };
        }

        let replaced = match inner.position(key) {
            Some(index) => inner.remove_at(index).is_some(),
            None => false,
        };

        let mut evicted = Vec::new();
        while inner.total_size + size > self.limits.max_size {
            match inner.evict_oldest() {
                Some(entry) => {
                    tracing::debug!(key = %entry.key, size = entry.size, "Evicted cache entry");
                    evicted.push(entry.key);
                }
                None => break,
            }
        }

        let now = inner.tick();
        inner.entries.push_front(CacheEntry {
            key: key.to_string(),
            payload,
            size,
            last_access: now,
        });
        inner.total_size += size;
        inner.insertions += 1;
        let total_size = inner.total_size;
        drop(inner);

        metrics::record_cache_evictions(evicted.len());
        metrics::record_cache_size(total_size);
        InsertOutcome::Stored { evicted, replaced }
    }

    /// Evict the least-recently-accessed entry, returning its key.
    pub fn evict_oldest(&self) -> Option<String> {
        let mut inner = self.lock();
        let entry = inner.evict_oldest()?;
        let total_size = inner.total_size;
        drop(inner);

        metrics::record_cache_evictions(1);
        metrics::record_cache_size(total_size);
        Some(entry.key)
    }

    /// Aggregate size of all entries.
    pub fn total_size(&self) -> usize {
        self.lock().total_size
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Keys in traversal order, most recently inserted first.
    pub fn keys(&self) -> Vec<String> {
        self.lock()
            .entries
            .iter()
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Copies of all entries in traversal order.
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            insertions: inner.insertions,
            evictions: inner.evictions,
            oversize_skips: inner.oversize_skips,
            entries: inner.entries.len(),
            size_bytes: inner.total_size,
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
