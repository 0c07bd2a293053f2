//! Shared collaborators every plugin handle is bound to

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::handle::PluginHandle;
use super::module::{Catalog, ModuleLoader};
use crate::command::CommandSurface;
use crate::status::StatusSink;

/// Command surface, status sink and module loader of one CLI invocation
#[derive(Clone)]
pub struct PluginHost {
    pub commands: Arc<CommandSurface>,
    pub sink: Arc<dyn StatusSink>,
    pub loader: Arc<dyn ModuleLoader>,
    /// Whether discovery also considers globally installed packages
    pub include_global: bool,
}

impl fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHost")
            .field("commands", &self.commands)
            .field("include_global", &self.include_global)
            .finish_non_exhaustive()
    }
}

impl PluginHost {
    pub fn new(
        commands: Arc<CommandSurface>,
        sink: Arc<dyn StatusSink>,
        loader: Arc<dyn ModuleLoader>,
    ) -> Self {
        Self {
            commands,
            sink,
            loader,
            include_global: true,
        }
    }

    /// Host with an empty command surface that only loads `catalog` modules
    pub fn with_catalog(sink: Arc<dyn StatusSink>, catalog: Catalog) -> Self {
        Self::new(CommandSurface::new(), sink, Arc::new(catalog))
    }

    pub fn without_global_packages(mut self) -> Self {
        self.include_global = false;
        self
    }

    /// Creates a handle bound to this host.
    pub fn handle(
        &self,
        id: impl Into<String>,
        import_base: impl Into<PathBuf>,
        base: impl Into<PathBuf>,
    ) -> Arc<PluginHandle> {
        Arc::new(PluginHandle::new(
            id,
            import_base,
            base,
            Arc::clone(&self.commands),
            Arc::clone(&self.sink),
        ))
    }
}
