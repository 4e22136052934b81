//! Bounded recency cache for delivered bundles.
//!
//! Keys are normalised queries (trimmed, lower-cased, whitespace collapsed)
//! cut to 100 characters. A zero capacity or a poisoned lock turns the cache
//! into a no-op; callers never see an error.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// Longest key kept, in characters.
pub const MAX_KEY_CHARS: usize = 100;

/// Normalise a query into a cache key.
pub fn cache_key(query: &str) -> String {
    let normalised = query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    normalised.chars().take(MAX_KEY_CHARS).collect()
}

/// Least-recently-used cache of values keyed by query.
pub struct RecencyCache<V> {
    inner: Option<Mutex<LruCache<String, V>>>,
}

impl<V: Clone> RecencyCache<V> {
    /// A cache holding at most `capacity` entries. Zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// Build from the `[cache]` configuration section.
    pub fn from_config(config: &ctxroute_config::CacheConfig) -> Self {
        if config.enabled {
            Self::new(config.capacity)
        } else {
            Self::disabled()
        }
    }

    /// A cache that stores nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Look up a query, marking it most recently used.
    pub fn get(&self, query: &str) -> Option<V> {
        let mut cache = self.inner.as_ref()?.lock().ok()?;
        cache.get(&cache_key(query)).cloned()
    }

    /// Store a value for a query, evicting the least recently used entry if full.
    pub fn put(&self, query: &str, value: V) {
        if let Some(lock) = self.inner.as_ref()
            && let Ok(mut cache) = lock.lock()
        {
            cache.put(cache_key(query), value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .as_ref()
            .and_then(|lock| lock.lock().ok().map(|c| c.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(lock) = self.inner.as_ref()
            && let Ok(mut cache) = lock.lock()
        {
            cache.clear();
        }
    }
}
