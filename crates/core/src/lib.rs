//! orbit-core - plugin registry and configuration chaining for the orbit CLI
//!
//! This crate provides:
//! - Discovery of plugins declared by a project's `package.json`
//! - One [`PluginHandle`] per plugin for status output, templating, command
//!   registration and configuration chaining
//! - Lifecycle hook invocation with per-plugin failure isolation
//! - Deterministic, ordered merging of configuration chains
pub mod bundler;
pub mod cache;
pub mod command;
pub mod config;
pub mod error;
pub mod options;
pub mod package_manager;
pub mod plugin;
pub mod status;
pub mod template;

// Re-export commonly used types
pub use error::{Error, Result};

pub use bundler::{BundleReport, Bundler, ConfigEmitter};
pub use cache::RegistryCache;
pub use command::{CommandArgs, CommandOptions, CommandSurface};
pub use config::BuildConfig;
pub use options::{CliOptions, HookOptions};
pub use package_manager::PackageManager;
pub use plugin::{
    Catalog, LayeredLoader, ModuleLoader, PluginHandle, PluginHost, PluginModule, PluginRegistry,
    ProcessLoader, hooks,
};
pub use status::{MemorySink, StatusKind, StatusReporter, StatusSink};
