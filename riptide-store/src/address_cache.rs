//! §4.3 Address Cache — caches `(host, port)` lookups from the engine,
//! keyed by [`ServiceKey`]. Negative results (the service isn't running)
//! are never cached, so a container that just started is picked up on the
//! very next request instead of waiting out the TTL.

use std::sync::Arc;

use riptide_core::project::{Project, ServiceKey};
use riptide_engine::Engine;

use crate::cache::TtlCache;

pub struct AddressCache {
    cache: TtlCache<ServiceKey, (String, u16)>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self {
            cache: TtlCache::new(),
        }
    }

    /// Resolves the live address for `service_name` in `project`, consulting
    /// the cache first and falling back to the engine on miss/stale.
    pub async fn resolve(
        &self,
        engine: &dyn Engine,
        project: &Project,
        service_name: &str,
    ) -> Option<(String, u16)> {
        let key = ServiceKey::new(project.name.clone(), service_name.to_string());
        if let Some(addr) = self.cache.get_fresh(&key) {
            return Some(addr);
        }

        let addr = engine.address_for(project, service_name).await?;
        self.cache.insert(key, addr.clone());
        Some(addr)
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riptide_core::project::App;
    use riptide_engine::memory::MemoryEngine;
    use std::collections::HashMap;

    fn project(name: &str) -> Project {
        Project {
            name: name.to_string(),
            app: App {
                services: HashMap::new(),
            },
            default_services: None,
        }
    }

    #[tokio::test]
    async fn resolve_returns_none_for_unseeded_service() {
        let engine = MemoryEngine::new();
        let cache = AddressCache::new();
        let addr = cache.resolve(&engine, &project("demo"), "web").await;
        assert_eq!(addr, None);
    }

    #[tokio::test]
    async fn resolve_caches_positive_result() {
        let engine = MemoryEngine::new();
        engine.seed_address("demo", "web", "172.17.0.2", 8080);
        let cache = AddressCache::new();
        let first = cache.resolve(&engine, &project("demo"), "web").await;
        assert_eq!(first, Some(("172.17.0.2".to_string(), 8080)));

        // Mutate the engine's seed; cache should still serve the old value
        // until the entry goes stale, since the lookup hit the cache.
        engine.seed_address("demo", "web", "172.17.0.9", 9090);
        let second = cache.resolve(&engine, &project("demo"), "web").await;
        assert_eq!(second, Some(("172.17.0.2".to_string(), 8080)));
    }

    #[tokio::test]
    async fn negative_result_is_never_cached() {
        let engine = MemoryEngine::new();
        let cache = AddressCache::new();
        assert_eq!(cache.resolve(&engine, &project("demo"), "web").await, None);

        engine.seed_address("demo", "web", "172.17.0.2", 8080);
        let addr = cache.resolve(&engine, &project("demo"), "web").await;
        assert_eq!(addr, Some(("172.17.0.2".to_string(), 8080)));
    }

    #[tokio::test]
    async fn clear_forces_a_fresh_engine_lookup() {
        let engine = MemoryEngine::new();
        engine.seed_address("demo", "web", "172.17.0.2", 8080);
        let cache = AddressCache::new();
        let _ = cache.resolve(&engine, &project("demo"), "web").await;

        engine.seed_address("demo", "web", "172.17.0.9", 9090);
        cache.clear();
        let addr = cache.resolve(&engine, &project("demo"), "web").await;
        assert_eq!(addr, Some(("172.17.0.9".to_string(), 9090)));
    }
}
