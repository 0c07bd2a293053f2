use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::plugin::{PluginHost, PluginRegistry};

/// Discovered registries, memoised per working directory.
///
/// Discovery reads manifests and may shell out for global packages, so
/// commands share one registry per directory. Call [`RegistryCache::invalidate`]
/// after installing or removing plugins.
#[derive(Debug, Default)]
pub struct RegistryCache {
    entries: Mutex<HashMap<PathBuf, Arc<PluginRegistry>>>,
}

impl RegistryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached registry for `cwd`, discovering it on first use.
    pub fn get_or_discover(&self, cwd: &Path, host: &PluginHost) -> Arc<PluginRegistry> {
        self.get_or_insert_with(cwd, || {
            PluginRegistry::from_declared_dependencies(cwd, host.clone())
        })
    }

    pub fn get_or_insert_with<F>(&self, cwd: &Path, create: F) -> Arc<PluginRegistry>
    where
        F: FnOnce() -> PluginRegistry,
    {
        if let Some(registry) = self.entries.lock().get(cwd) {
            debug!("Using cached plugin registry for {:?}", cwd);
            return Arc::clone(registry);
        }

        // Discovery runs unlocked; a concurrent insert for the same key wins.
        let registry = Arc::new(create());
        Arc::clone(
            self.entries
                .lock()
                .entry(cwd.to_path_buf())
                .or_insert(registry),
        )
    }

    pub fn get(&self, cwd: &Path) -> Option<Arc<PluginRegistry>> {
        self.entries.lock().get(cwd).cloned()
    }

    /// Drops every cached registry.
    pub fn invalidate(&self) {
        debug!("Invalidating plugin registry cache");
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Catalog;
    use crate::status::MemorySink;

    fn host() -> PluginHost {
        PluginHost::with_catalog(Arc::new(MemorySink::new()), Catalog::new()).without_global_packages()
    }

    #[test]
    fn test_memoises_until_invalidated() {
        let cache = RegistryCache::new();
        let host = host();
        let calls = Mutex::new(0);
        let create = || {
            *calls.lock() += 1;
            PluginRegistry::new(host.clone())
        };

        let first = cache.get_or_insert_with(Path::new("/a"), create);
        let second = cache.get_or_insert_with(Path::new("/a"), create);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*calls.lock(), 1);

        cache.get_or_insert_with(Path::new("/b"), create);
        assert_eq!(cache.len(), 2);

        cache.invalidate();
        assert!(cache.is_empty());
        let third = cache.get_or_insert_with(Path::new("/a"), create);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*calls.lock(), 3);
    }

    #[test]
    fn test_get_or_discover_without_manifest() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = RegistryCache::new();
        let registry = cache.get_or_discover(dir.path(), &host());
        assert!(cache.get(dir.path()).is_some());
        if !dir.path().ancestors().any(|d| d.join("package.json").is_file()) {
            assert!(registry.is_empty());
        }
    }
}
