//! A small sliding-expiration cache: entries refresh their last-access
//! timestamp on every hit and are reloaded once they've gone untouched for
//! longer than the configured TTL. Built on `DashMap`, the same concurrent
//! map the config cache in the underlying gateway codebase uses for
//! lock-free per-key access.

use std::time::{Duration, Instant};

use dashmap::DashMap;

const DEFAULT_TTL: Duration = Duration::from_secs(120);

struct Entry<V> {
    value: V,
    last_access: Instant,
}

/// A `DashMap`-backed cache where staleness is measured from the last
/// access (read or refresh), not from insertion time.
pub struct TtlCache<K, V> {
    map: DashMap<K, Entry<V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            map: DashMap::new(),
            ttl,
        }
    }

    /// Returns a cached value if present and not stale, bumping its
    /// last-access time on hit. Returns `None` on miss or staleness —
    /// the caller is expected to reload and call [`Self::insert`].
    pub fn get_fresh(&self, key: &K) -> Option<V> {
        let mut entry = self.map.get_mut(key)?;
        if entry.last_access.elapsed() > self.ttl {
            return None;
        }
        entry.last_access = Instant::now();
        Some(entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.map.insert(
            key,
            Entry {
                value,
                last_access: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &K) {
        self.map.remove(key);
    }

    pub fn clear(&self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_on_empty_cache() {
        let cache: TtlCache<String, i32> = TtlCache::new();
        assert_eq!(cache.get_fresh(&"k".to_string()), None);
    }

    #[test]
    fn hit_returns_inserted_value() {
        let cache = TtlCache::new();
        cache.insert("k".to_string(), 42);
        assert_eq!(cache.get_fresh(&"k".to_string()), Some(42));
    }

    #[test]
    fn entry_older_than_ttl_is_treated_as_a_miss() {
        let cache: TtlCache<String, i32> = TtlCache::with_ttl(Duration::from_millis(10));
        cache.insert("k".to_string(), 42);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get_fresh(&"k".to_string()), None);
    }

    #[test]
    fn get_fresh_refreshes_last_access() {
        let cache: TtlCache<String, i32> = TtlCache::with_ttl(Duration::from_millis(50));
        cache.insert("k".to_string(), 1);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get_fresh(&"k".to_string()), Some(1));
        std::thread::sleep(Duration::from_millis(30));
        // Would have expired from the original insert, but the hit above
        // refreshed last_access so this should still be fresh.
        assert_eq!(cache.get_fresh(&"k".to_string()), Some(1));
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = TtlCache::new();
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
