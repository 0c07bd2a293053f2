use std::path::Path;
use std::sync::Arc;

use orbit_core::bundler::{Bundler, ConfigEmitter};
use orbit_core::command::CommandSurface;
use orbit_core::plugin::{LayeredLoader, ModuleLoader, PluginHost, PluginRegistry, ProcessLoader};
use orbit_core::status::StatusSink;
use orbit_core::{CliOptions, HookOptions, RegistryCache};

use crate::plugins;

/// State shared by every built-in command of one CLI invocation
pub struct CliContext {
    pub options: CliOptions,
    pub host: PluginHost,
    pub cache: RegistryCache,
    pub bundler: Arc<dyn Bundler>,
}

impl CliContext {
    /// Context with the default loader stack: compiled-in plugins first,
    /// then out-of-process plugins.
    pub fn new(options: CliOptions, sink: Arc<dyn StatusSink>) -> Self {
        let host = PluginHost::new(CommandSurface::new(), sink, default_loader());
        Self::with_host(options, host)
    }

    pub fn with_host(options: CliOptions, host: PluginHost) -> Self {
        Self {
            options,
            host,
            cache: RegistryCache::new(),
            bundler: Arc::new(ConfigEmitter),
        }
    }

    pub fn with_bundler(mut self, bundler: Arc<dyn Bundler>) -> Self {
        self.bundler = bundler;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.options.cwd
    }

    /// Plugins of the working directory
    pub fn registry(&self) -> Arc<PluginRegistry> {
        self.registry_at(&self.options.cwd)
    }

    pub fn registry_at(&self, dir: &Path) -> Arc<PluginRegistry> {
        self.cache.get_or_discover(dir, &self.host)
    }

    pub fn hook_options(&self) -> HookOptions {
        HookOptions::from_cli(&self.options)
    }

    /// Hook options for a project other than the working directory
    pub fn hook_options_at(&self, dir: &Path) -> HookOptions {
        let mut cli = self.options.clone();
        cli.cwd = dir.to_path_buf();
        HookOptions::from_cli(&cli)
    }
}

fn default_loader() -> Arc<dyn ModuleLoader> {
    Arc::new(
        LayeredLoader::new()
            .with_layer(Arc::new(plugins::catalog()))
            .with_layer(Arc::new(ProcessLoader::new())),
    )
}
