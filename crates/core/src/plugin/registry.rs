//! The plugin registry
//!
//! Holds one [`PluginHandle`] per plugin, keyed by package name, in
//! discovery order. That order drives every bulk operation:
//!
//! - [`PluginRegistry::invoke`] runs a hook on every plugin. Plugins run
//!   concurrently and fail independently; results keep registry order.
//! - [`PluginRegistry::merge_configuration`] folds every chain callback into
//!   one configuration, strictly in order, and aborts on the first failure.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, warn};

use super::discovery::{self, ProjectManifest};
use super::handle::PluginHandle;
use super::host::PluginHost;
use super::module::{PluginDescriptor, PluginModule};
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::options::HookOptions;
use crate::status::StatusReporter;

/// Source id used for registry-level status lines
const REGISTRY_SOURCE: &str = "orbit";

pub struct PluginRegistry {
    plugins: IndexMap<String, Arc<PluginHandle>>,
    host: PluginHost,
    modules: Mutex<HashMap<String, PluginModule>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.ids())
            .finish_non_exhaustive()
    }
}

impl PluginRegistry {
    /// Empty registry
    pub fn new(host: PluginHost) -> Self {
        Self {
            plugins: IndexMap::new(),
            host,
            modules: Mutex::new(HashMap::new()),
        }
    }

    /// Registry of the named packages, resolved from `base` upward.
    ///
    /// Entries are resolved in parallel; handles are inserted in the order
    /// of `names`.
    pub fn from_plugins(base: &Path, host: PluginHost, names: &[String]) -> Result<Self> {
        Self::from_plugins_in(base, host, names, &discovery::node_modules_dirs(base))
    }

    fn from_plugins_in(
        base: &Path,
        host: PluginHost,
        names: &[String],
        search_dirs: &[PathBuf],
    ) -> Result<Self> {
        let loader = Arc::clone(&host.loader);
        let entries = names
            .par_iter()
            .map(|name| match discovery::resolve_entry(name, search_dirs) {
                Ok(entry) => Ok(entry),
                Err(_) if loader.is_builtin(name) => Ok(base.join(name)),
                Err(err) => Err(err),
            })
            .collect::<Result<Vec<PathBuf>>>()?;

        let mut registry = Self::new(host);
        for (name, entry) in names.iter().zip(entries) {
            let handle = registry.host.handle(name.clone(), entry, base);
            registry.add(handle)?;
        }
        Ok(registry)
    }

    /// Discovers plugins declared by the project around `cwd`.
    ///
    /// Never fails: any discovery error yields an empty registry so that
    /// built-in commands keep working.
    pub fn from_declared_dependencies(cwd: &Path, host: PluginHost) -> Self {
        match Self::discover(cwd, host.clone()) {
            Ok(registry) => registry,
            Err(err) => {
                debug!("Plugin discovery failed, continuing without plugins: {}", err);
                Self::new(host)
            }
        }
    }

    /// Fallible discovery behind [`Self::from_declared_dependencies`]
    pub fn discover(cwd: &Path, host: PluginHost) -> Result<Self> {
        let manifest_path = discovery::find_manifest(cwd)?;
        let manifest = ProjectManifest::load(&manifest_path)?;
        let root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());

        let mut search_dirs = discovery::node_modules_dirs(&root);
        let mut global = Vec::new();
        if host.include_global {
            match discovery::global_packages() {
                Ok((modules_dir, packages)) => {
                    search_dirs.push(modules_dir);
                    global = packages;
                }
                Err(err) => debug!("Skipping global packages: {}", err),
            }
        }

        let declared = discovery::declared_plugins(&manifest, &global);
        if !declared.in_dependencies.is_empty() {
            warn!(
                "Plugins declared as regular dependencies: {:?}",
                declared.in_dependencies
            );
            StatusReporter::new(REGISTRY_SOURCE, Arc::clone(&host.sink))
                .info("WARNING: CLI plugins should be added as development dependencies.");
        }

        debug!("Discovered plugins {:?} in {:?}", declared.names, root);
        Self::from_plugins_in(&root, host, &declared.names, &search_dirs)
    }

    /// Adds a handle. Ids are unique; a duplicate is rejected and not kept.
    pub fn add(&mut self, handle: Arc<PluginHandle>) -> Result<()> {
        if self.plugins.contains_key(handle.id()) {
            return Err(Error::DuplicatePlugin(handle.id().to_string()));
        }
        debug!("Adding plugin ID {}", handle.id());
        self.plugins.insert(handle.id().to_string(), handle);
        Ok(())
    }

    /// Adds a handle together with its already loaded module.
    pub fn add_preloaded(&mut self, handle: Arc<PluginHandle>, module: PluginModule) -> Result<()> {
        let id = handle.id().to_string();
        self.add(handle)?;
        self.modules.lock().insert(id, module);
        Ok(())
    }

    /// Looks up a plugin by exact id, or by short name under either naming
    /// convention.
    pub fn plugin(&self, name: &str) -> Result<Arc<PluginHandle>> {
        if let Some(handle) = self.plugins.get(name) {
            return Ok(Arc::clone(handle));
        }
        discovery::plugin_name_candidates(name)
            .iter()
            .find_map(|candidate| self.plugins.get(candidate))
            .cloned()
            .ok_or_else(|| Error::PluginNotFound(name.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&Arc<PluginHandle>> {
        self.plugins.get(id)
    }

    /// Plugin ids in registry order
    pub fn ids(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn handles(&self) -> impl Iterator<Item = &Arc<PluginHandle>> {
        self.plugins.values()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn host(&self) -> &PluginHost {
        &self.host
    }

    /// Runs `hook` on every plugin, concurrently.
    ///
    /// The result has one slot per plugin in registry order; plugins without
    /// the hook, or whose hook failed, yield `None`.
    pub fn invoke(&self, hook: &str, options: &HookOptions) -> Vec<Option<Value>> {
        debug!("Calling function {:?} on plugins {:?}", hook, self.ids());
        let handles: Vec<&Arc<PluginHandle>> = self.plugins.values().collect();
        handles
            .par_iter()
            .map(|handle| self.invoke_handle(handle, hook, options))
            .collect()
    }

    /// Like [`Self::invoke`], but one plugin after the other.
    ///
    /// Used where side effects must happen in registry order, such as
    /// command registration.
    pub fn invoke_ordered(&self, hook: &str, options: &HookOptions) -> Vec<Option<Value>> {
        self.plugins
            .values()
            .map(|handle| self.invoke_handle(handle, hook, options))
            .collect()
    }

    /// Runs `hook` on a single plugin, looked up like [`Self::plugin`].
    pub fn invoke_single(
        &self,
        name: &str,
        hook: &str,
        options: &HookOptions,
    ) -> Result<Option<Value>> {
        let handle = self.plugin(name)?;
        Ok(self.invoke_handle(&handle, hook, options))
    }

    /// Runs `hook` on one handle with failure isolation.
    ///
    /// Load errors, hook errors and panics are reported on the plugin's
    /// status channel and turned into `None`.
    pub fn invoke_handle(
        &self,
        handle: &PluginHandle,
        hook: &str,
        options: &HookOptions,
    ) -> Option<Value> {
        let module = match self.module_for(handle) {
            Ok(module) => module,
            Err(err) => {
                debug!("Plugin {} failed to load: {}", handle.id(), err);
                handle
                    .status()
                    .error(&format!("Plugin execution error, skipping: {err}"));
                return None;
            }
        };

        let Some(hook_fn) = module.hook(hook) else {
            debug!("Invoking {:?} from plugin {}: doesn't exist", hook, handle.id());
            return None;
        };
        debug!("Invoking {:?} from plugin {}: exists", hook, handle.id());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook_fn(handle, options)));
        let result = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                self.report_hook_failure(handle, hook, format!("{err:#}"));
                None
            }
            Err(payload) => {
                self.report_hook_failure(handle, hook, panic_message(payload.as_ref()));
                None
            }
        };

        handle.status().done();
        result
    }

    fn report_hook_failure(&self, handle: &PluginHandle, hook: &str, message: String) {
        let error = Error::PluginHook {
            id: handle.id().to_string(),
            hook: hook.to_string(),
            message,
        };
        debug!("Plugin {} exec error: {}", handle.id(), error);
        handle
            .status()
            .error(&format!("Plugin execution error, skipping: {error}"));
    }

    fn module_for(&self, handle: &PluginHandle) -> Result<PluginModule> {
        if let Some(module) = self.modules.lock().get(handle.id()) {
            return Ok(module.clone());
        }

        let descriptor = PluginDescriptor {
            id: handle.id().to_string(),
            entry: handle.import_base().to_path_buf(),
            project_root: handle.base().to_path_buf(),
        };
        let module = self.host.loader.load(&descriptor)?;

        Ok(self
            .modules
            .lock()
            .entry(descriptor.id)
            .or_insert(module)
            .clone())
    }

    /// Applies every chain callback to `base`, plugin by plugin in registry
    /// order and callback by callback in registration order.
    ///
    /// A callback returning a configuration replaces the accumulator. The
    /// first failing callback aborts the merge.
    pub fn merge_configuration(&self, base: BuildConfig) -> Result<BuildConfig> {
        let mut config = base;
        for handle in self.plugins.values() {
            debug!("Applying configuration chains for {}", handle.id());
            for chain in handle.get_chains() {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| chain(&mut config)));
                match outcome {
                    Ok(Ok(Some(next))) => config = next,
                    Ok(Ok(None)) => {}
                    Ok(Err(err)) => {
                        return Err(Error::ConfigurationMerge {
                            id: handle.id().to_string(),
                            message: format!("{err:#}"),
                        });
                    }
                    Err(payload) => {
                        return Err(Error::ConfigurationMerge {
                            id: handle.id().to_string(),
                            message: panic_message(payload.as_ref()),
                        });
                    }
                }
            }
        }
        Ok(config)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked".to_string()
    }
}
