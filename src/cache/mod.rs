//! Named cache subsystem.
//!
//! # Data Flow
//! ```text
//! caller (repository, controller manager, renderer)
//!     → manager.rs (get or create a named cache)
//!     → NamedCache implementation:
//!         - memory.rs (plain concurrent map)
//!         - lru.rs (bounded, evicting, honors flush interval)
//!     → CacheValue (opaque Arc, downcast by the caller)
//! ```
//!
//! # Design Decisions
//! - Values are opaque `Arc<dyn Any>`; each caller knows what it stored
//! - A missing key is `None`, never an error
//! - Every implementation is safe for concurrent get/put/remove
//! - Cache unavailability degrades to the in-memory map, never aborts

pub(crate) mod lock;
pub mod lru;
pub mod manager;
pub mod memory;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

pub use self::lru::LruNamedCache;
pub use manager::{CacheFactory, CacheManager};
pub use memory::MemoryCache;

/// Opaque cached value.
pub type CacheValue = Arc<dyn Any + Send + Sync>;

/// Errors raised by cache implementations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache was destroyed and removed from its manager.
    #[error("cache {0} has been destroyed")]
    Destroyed(String),

    /// No factory is registered for the configured kind.
    #[error("unknown cache kind: {0}")]
    UnknownKind(String),

    /// The configuration cannot produce a working cache.
    #[error("invalid cache configuration for {name}: {reason}")]
    InvalidConfig { name: String, reason: String },
}

/// Counters reported by a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// A process-wide, string-keyed cache.
pub trait NamedCache: Send + Sync {
    /// Name this cache is registered under.
    fn name(&self) -> &str;

    /// Look up a key. Missing keys are `None`.
    fn get(&self, key: &str) -> Option<CacheValue>;

    /// Store a value, replacing any previous one.
    fn put(&self, key: &str, value: CacheValue) -> Result<(), CacheError>;

    /// Remove a key, returning the previous value.
    fn remove(&self, key: &str) -> Option<CacheValue>;

    /// Drop every entry.
    fn clear(&self);

    /// Clear and mark unusable. Later `put` calls fail with `Destroyed`.
    fn destroy(&self);

    /// Keys currently held.
    fn list_keys(&self) -> Vec<String>;

    /// Implementation-defined counters.
    fn statistics(&self) -> Option<CacheStats> {
        None
    }

    /// Advisory flush interval.
    fn flush_interval(&self) -> Option<Duration> {
        None
    }
}

/// Typed lookup over an opaque cache.
pub fn get_typed<T: Any + Send + Sync>(cache: &dyn NamedCache, key: &str) -> Option<Arc<T>> {
    cache.get(key).and_then(|value| value.downcast::<T>().ok())
}
