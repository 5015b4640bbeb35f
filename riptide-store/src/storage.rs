//! §3 `RuntimeStorage` — the process-wide bundle of caches and engine
//! handle every resolver call reads and the cache-flush retry path (§4.5)
//! mutates. A `Clone`, `Arc`-backed handle wrapping the interior maps
//! rather than passing them around individually.

use std::path::PathBuf;
use std::sync::Arc;

use riptide_engine::Engine;

use crate::address_cache::AddressCache;
use crate::project_cache::ProjectCache;

/// Bundles the two TTL caches (§4.2, §4.3), the engine handle, and the
/// `use_compression` flag (§3) into a single handle cloned into every
/// request handler.
#[derive(Clone)]
pub struct RuntimeStorage {
    pub projects: Arc<ProjectCache>,
    pub addresses: Arc<AddressCache>,
    pub engine: Arc<dyn Engine>,
    pub use_compression: bool,
}

impl RuntimeStorage {
    pub fn new(search_dirs: Vec<PathBuf>, engine: Arc<dyn Engine>, use_compression: bool) -> Self {
        Self {
            projects: Arc::new(ProjectCache::new(search_dirs)),
            addresses: Arc::new(AddressCache::new()),
            engine,
            use_compression,
        }
    }

    /// §4.5 cache-flush retry path / I3: flushes the project mapping, the
    /// parsed-project cache, and the address cache together.
    pub fn flush_caches(&self) {
        self.projects.flush();
        self.addresses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riptide_engine::memory::MemoryEngine;

    #[test]
    fn flush_caches_clears_both_caches() {
        let storage = RuntimeStorage::new(vec![], Arc::new(MemoryEngine::new()), false);
        storage.flush_caches();
        assert_eq!(storage.projects.all_project_names().len(), 0);
    }
}
