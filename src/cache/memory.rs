//! Plain in-memory cache.
//!
//! Unbounded concurrent map. This is the fallback implementation the
//! manager uses whenever a configured cache cannot be built.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::cache::{CacheError, CacheStats, CacheValue, NamedCache};
use crate::observability::metrics;

/// Unbounded cache backed by a `DashMap`.
pub struct MemoryCache {
    name: String,
    entries: DashMap<String, CacheValue>,
    flush_interval: Option<Duration>,
    destroyed: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            flush_interval: None,
            destroyed: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Record an advisory flush interval. Not enforced by this implementation.
    pub fn with_flush_interval(mut self, interval: Option<Duration>) -> Self {
        self.flush_interval = interval;
        self
    }
}

impl NamedCache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<CacheValue> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup(&self.name, true);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup(&self.name, false);
                None
            }
        }
    }

    fn put(&self, key: &str, value: CacheValue) -> Result<(), CacheError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(CacheError::Destroyed(self.name.clone()));
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Option<CacheValue> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.entries.clear();
    }

    fn list_keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    fn statistics(&self) -> Option<CacheStats> {
        Some(CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: 0,
        })
    }

    fn flush_interval(&self) -> Option<Duration> {
        self.flush_interval
    }
}
