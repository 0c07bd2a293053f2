//! Caching of discovered plugin registries

pub mod registry_cache;

pub use registry_cache::RegistryCache;
