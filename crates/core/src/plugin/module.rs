//! Plugin modules and how they are loaded
//!
//! A plugin module is an explicit map from hook name to callable. Loaders
//! turn a [`PluginDescriptor`] into a [`PluginModule`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::handle::PluginHandle;
use crate::error::{Error, Result};
use crate::options::HookOptions;

/// Conventional lifecycle hook names
pub mod hooks {
    /// Registers commands at startup
    pub const CLI: &str = "cli";
    pub const BUILD: &str = "build";
    pub const WATCH: &str = "watch";
    /// Returns dependency maps to add to the project manifest
    pub const INSTALL: &str = "install";
}

/// A lifecycle hook implementation
pub type HookFn =
    Arc<dyn Fn(&PluginHandle, &HookOptions) -> anyhow::Result<Option<Value>> + Send + Sync>;

/// Loaded plugin: the hooks it implements, in declaration order
#[derive(Clone, Default)]
pub struct PluginModule {
    hooks: IndexMap<String, HookFn>,
}

impl fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginModule")
            .field("hooks", &self.hook_names())
            .finish()
    }
}

impl PluginModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&PluginHandle, &HookOptions) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
        self
    }

    pub fn insert_hook(&mut self, name: impl Into<String>, hook: HookFn) {
        self.hooks.insert(name.into(), hook);
    }

    pub fn hook(&self, name: &str) -> Option<HookFn> {
        self.hooks.get(name).cloned()
    }

    pub fn implements(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.keys().map(String::as_str).collect()
    }
}

/// Where a plugin was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    /// Package name, unique per registry
    pub id: String,
    /// Resolved module entry
    pub entry: PathBuf,
    pub project_root: PathBuf,
}

/// Resolves descriptors to modules
pub trait ModuleLoader: Send + Sync {
    fn load(&self, descriptor: &PluginDescriptor) -> Result<PluginModule>;

    /// Whether `id` is compiled in and needs no resolvable entry on disk
    fn is_builtin(&self, _id: &str) -> bool {
        false
    }
}

/// Compiled-in plugin modules keyed by package id
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    modules: IndexMap<String, PluginModule>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, id: impl Into<String>, module: PluginModule) -> Self {
        self.register(id, module);
        self
    }

    pub fn register(&mut self, id: impl Into<String>, module: PluginModule) {
        self.modules.insert(id.into(), module);
    }

    pub fn get(&self, id: &str) -> Option<&PluginModule> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

impl ModuleLoader for Catalog {
    fn load(&self, descriptor: &PluginDescriptor) -> Result<PluginModule> {
        self.modules
            .get(&descriptor.id)
            .cloned()
            .ok_or_else(|| Error::PluginLoad {
                id: descriptor.id.clone(),
                message: "not a built-in plugin".to_string(),
            })
    }

    fn is_builtin(&self, id: &str) -> bool {
        self.contains(id)
    }
}

/// Tries each loader in turn. Built-in loaders take precedence for the ids
/// they know; the first other loader that succeeds wins.
#[derive(Clone, Default)]
pub struct LayeredLoader {
    layers: Vec<Arc<dyn ModuleLoader>>,
}

impl LayeredLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.layers.push(loader);
        self
    }
}

impl ModuleLoader for LayeredLoader {
    fn load(&self, descriptor: &PluginDescriptor) -> Result<PluginModule> {
        if let Some(builtin) = self.layers.iter().find(|l| l.is_builtin(&descriptor.id)) {
            return builtin.load(descriptor);
        }

        let mut last_error = None;
        for layer in &self.layers {
            match layer.load(descriptor) {
                Ok(module) => return Ok(module),
                Err(err) => last_error = Some(err),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::PluginLoad {
            id: descriptor.id.clone(),
            message: "no module loader configured".to_string(),
        }))
    }

    fn is_builtin(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.is_builtin(id))
    }
}
