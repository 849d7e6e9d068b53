//! Registry of named caches.
//!
//! # Responsibilities
//! - Hand out one shared instance per cache name
//! - Build configured caches through a kind → factory registry
//! - Fall back to the in-memory map when a configured cache cannot be built
//!
//! # Design Decisions
//! - Factories are closures registered at startup, not looked up by type name
//! - `get_or_create_with_default` never fails; `get_cache` reports factory errors

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::cache::{CacheError, LruNamedCache, MemoryCache, NamedCache};
use crate::config::CacheConfig;

/// Builds a cache for a name from its configuration.
pub type CacheFactory =
    Box<dyn Fn(&str, &CacheConfig) -> Result<Arc<dyn NamedCache>, CacheError> + Send + Sync>;

/// Process-wide registry of named caches.
pub struct CacheManager {
    caches: DashMap<String, Arc<dyn NamedCache>>,
    configs: HashMap<String, CacheConfig>,
    factories: HashMap<String, CacheFactory>,
}

impl CacheManager {
    /// Create a manager with the builtin `memory` and `lru` kinds.
    pub fn new(configs: HashMap<String, CacheConfig>) -> Self {
        let mut manager = Self {
            caches: DashMap::new(),
            configs,
            factories: HashMap::new(),
        };

        manager.register_factory(
            "memory",
            Box::new(
                |name: &str, config: &CacheConfig| -> Result<Arc<dyn NamedCache>, CacheError> {
                    Ok(Arc::new(
                        MemoryCache::new(name).with_flush_interval(config.flush_interval()),
                    ))
                },
            ),
        );
        manager.register_factory(
            "lru",
            Box::new(
                |name: &str, config: &CacheConfig| -> Result<Arc<dyn NamedCache>, CacheError> {
                    let cache =
                        LruNamedCache::new(name, config.capacity, config.flush_interval())?;
                    Ok(Arc::new(cache))
                },
            ),
        );

        manager
    }

    /// Register a factory for a cache kind, replacing any previous one.
    pub fn register_factory(&mut self, kind: &str, factory: CacheFactory) {
        self.factories.insert(kind.to_string(), factory);
    }

    /// Build every configured cache up front.
    pub fn initialize(&self) {
        let mut names: Vec<&String> = self.configs.keys().collect();
        names.sort();
        for name in names {
            let cache = self.get_or_create_with_default(name);
            tracing::debug!(cache = %cache.name(), "Cache initialized");
        }
    }

    /// Get a cache, creating it on first access.
    ///
    /// Names without configuration get the in-memory map. Configured names
    /// report factory failures.
    pub fn get_cache(&self, name: &str) -> Result<Arc<dyn NamedCache>, CacheError> {
        if let Some(cache) = self.caches.get(name) {
            return Ok(cache.value().clone());
        }

        let cache = match self.configs.get(name) {
            Some(config) => self.build(name, config)?,
            None => Arc::new(MemoryCache::new(name)) as Arc<dyn NamedCache>,
        };

        Ok(self
            .caches
            .entry(name.to_string())
            .or_insert(cache)
            .value()
            .clone())
    }

    /// Get a cache, falling back to the in-memory map if the configured
    /// implementation cannot be built. Never fails.
    pub fn get_or_create_with_default(&self, name: &str) -> Arc<dyn NamedCache> {
        match self.get_cache(name) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!(
                    cache = %name,
                    error = %e,
                    "Configured cache unavailable, using in-memory fallback"
                );
                let flush = self.configs.get(name).and_then(CacheConfig::flush_interval);
                let fallback: Arc<dyn NamedCache> =
                    Arc::new(MemoryCache::new(name).with_flush_interval(flush));
                self.caches
                    .entry(name.to_string())
                    .or_insert(fallback)
                    .value()
                    .clone()
            }
        }
    }

    /// Look up an existing cache without creating it.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn NamedCache>> {
        self.caches.get(name).map(|cache| cache.value().clone())
    }

    /// Remove a cache from the registry and make it unusable.
    pub fn destroy(&self, name: &str) -> bool {
        match self.caches.remove(name) {
            Some((_, cache)) => {
                cache.destroy();
                tracing::info!(cache = %name, "Cache destroyed");
                true
            }
            None => false,
        }
    }

    /// Names of every live cache, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    fn build(&self, name: &str, config: &CacheConfig) -> Result<Arc<dyn NamedCache>, CacheError> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| CacheError::UnknownKind(config.kind.clone()))?;
        factory(name, config)
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl CacheConfig {
    /// Flush interval as a duration, if configured.
    pub fn flush_interval(&self) -> Option<Duration> {
        self.flush_interval_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: &str, capacity: usize) -> CacheConfig {
        CacheConfig {
            kind: kind.to_string(),
            capacity,
            flush_interval_secs: None,
        }
    }

    #[test]
    fn test_unconfigured_cache_is_created_on_demand() {
        let manager = CacheManager::default();
        let first = manager.get_cache("scripts").unwrap();
        let second = manager.get_cache("scripts").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.names(), vec!["scripts".to_string()]);
    }

    #[test]
    fn test_configured_lru_cache() {
        let mut configs = HashMap::new();
        configs.insert("content".to_string(), config("lru", 2));
        let manager = CacheManager::new(configs);

        let cache = manager.get_cache("content").unwrap();
        cache.put("a", Arc::new(1u32)).unwrap();
        cache.put("b", Arc::new(2u32)).unwrap();
        cache.put("c", Arc::new(3u32)).unwrap();
        assert_eq!(cache.list_keys().len(), 2);
    }

    #[test]
    fn test_broken_config_falls_back_to_memory() {
        let mut configs = HashMap::new();
        configs.insert("content".to_string(), config("lru", 0));
        configs.insert("other".to_string(), config("redis", 10));
        let manager = CacheManager::new(configs);

        assert!(manager.get_cache("content").is_err());
        assert!(matches!(
            manager.get_cache("other"),
            Err(CacheError::UnknownKind(_))
        ));

        let cache = manager.get_or_create_with_default("content");
        cache.put("a", Arc::new(1u32)).unwrap();
        assert!(cache.get("a").is_some());

        // The fallback is now the registered instance
        let again = manager.get_cache("content").unwrap();
        assert!(Arc::ptr_eq(&cache, &again));
    }

    #[test]
    fn test_destroy_removes_cache() {
        let manager = CacheManager::default();
        let cache = manager.get_cache("tmp").unwrap();
        assert!(manager.destroy("tmp"));
        assert!(manager.lookup("tmp").is_none());
        assert!(cache.put("a", Arc::new(1u32)).is_err());
        assert!(!manager.destroy("tmp"));
    }
}
