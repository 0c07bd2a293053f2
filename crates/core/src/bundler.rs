//! Hand-off of the merged configuration to a bundler

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::config::BuildConfig;
use crate::options::HookOptions;

/// File written by [`ConfigEmitter`] into the destination directory
pub const EMITTED_CONFIG_FILE: &str = "orbit.build.json";

/// Outcome of a bundler run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleReport {
    /// Files produced by the run
    pub outputs: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Consumes a merged build configuration
pub trait Bundler: Send + Sync {
    fn bundle(&self, config: &BuildConfig, options: &HookOptions) -> anyhow::Result<BundleReport>;
}

/// Bundler that materialises the configuration as pretty JSON under `dest`
#[derive(Debug, Clone, Default)]
pub struct ConfigEmitter;

impl Bundler for ConfigEmitter {
    fn bundle(&self, config: &BuildConfig, options: &HookOptions) -> anyhow::Result<BundleReport> {
        fs::create_dir_all(&options.dest)?;
        let path = options.dest.join(EMITTED_CONFIG_FILE);
        let json = serde_json::to_string_pretty(config)?;
        fs::write(&path, json)?;
        info!("Wrote build configuration to {:?}", path);

        Ok(BundleReport {
            outputs: vec![path],
            warnings: Vec::new(),
        })
    }
}
