//! Bounded cache with LRU eviction.
//!
//! # Responsibilities
//! - Hold at most `capacity` entries, evicting the least recently used
//! - Expire entries older than the flush interval on access
//!
//! # Design Decisions
//! - A single mutex guards the LRU list (`get` reorders, so reads mutate)
//! - Expiry is lazy: nothing runs in the background

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use ::lru::LruCache;

use crate::cache::lock::LockRecover;
use crate::cache::{CacheError, CacheStats, CacheValue, NamedCache};
use crate::observability::metrics;

const SOURCE: &str = "cache::lru";

struct Entry {
    value: CacheValue,
    stored_at: Instant,
}

/// Capacity-bounded cache.
pub struct LruNamedCache {
    name: String,
    entries: Mutex<LruCache<String, Entry>>,
    flush_interval: Option<Duration>,
    destroyed: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl LruNamedCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        flush_interval: Option<Duration>,
    ) -> Result<Self, CacheError> {
        let name = name.into();
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| CacheError::InvalidConfig {
            name: name.clone(),
            reason: "capacity must be greater than zero".to_string(),
        })?;

        Ok(Self {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
            flush_interval,
            destroyed: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        self.flush_interval
            .map(|interval| entry.stored_at.elapsed() >= interval)
            .unwrap_or(false)
    }

    fn record_miss(&self) -> Option<CacheValue> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup(&self.name, false);
        None
    }
}

impl NamedCache for LruNamedCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<CacheValue> {
        let mut entries = self.entries.lock_recover(SOURCE, "get");

        let expired = match entries.get(key) {
            Some(entry) if !self.is_expired(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup(&self.name, true);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.record_miss()
    }

    fn put(&self, key: &str, value: CacheValue) -> Result<(), CacheError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(CacheError::Destroyed(self.name.clone()));
        }

        let entry = Entry {
            value,
            stored_at: Instant::now(),
        };
        let mut entries = self.entries.lock_recover(SOURCE, "put");
        if let Some((evicted_key, _)) = entries.push(key.to_string(), entry) {
            // push hands back the replaced entry too; only a different key is an eviction
            if evicted_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Option<CacheValue> {
        self.entries.lock_recover(SOURCE, "remove")
            .pop(key)
            .map(|entry| entry.value)
    }

    fn clear(&self) {
        self.entries.lock_recover(SOURCE, "clear").clear();
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.clear();
    }

    fn list_keys(&self) -> Vec<String> {
        self.entries.lock_recover(SOURCE, "list_keys")
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn statistics(&self) -> Option<CacheStats> {
        let entries = self.entries.lock_recover(SOURCE, "statistics").len();
        Some(CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }

    fn flush_interval(&self) -> Option<Duration> {
        self.flush_interval
    }
}
