//! Plugin handles, module loading, discovery and the registry

pub mod discovery;
pub mod handle;
pub mod host;
pub mod module;
pub mod process;
pub mod registry;

pub use discovery::{PLUGIN_PREFIXES, ProjectManifest, is_plugin_name};
pub use handle::{ChainCallback, PluginHandle};
pub use host::PluginHost;
pub use module::{
    Catalog, HookFn, LayeredLoader, ModuleLoader, PluginDescriptor, PluginModule, hooks,
};
pub use process::ProcessLoader;
pub use registry::PluginRegistry;
