//! Options passed down to plugin hooks
//!
//! [`CliOptions`] is built once from the global command-line flags;
//! each command derives a [`HookOptions`] from it and hands that to every
//! hook by reference.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::package_manager::PackageManager;

/// Global options shared by every command invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CliOptions {
    pub version: String,
    pub cwd: PathBuf,
    #[serde(rename = "pm")]
    pub package_manager: PackageManager,
    pub debug: bool,
}

impl CliOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            version: String::new(),
            cwd: cwd.into(),
            package_manager: PackageManager::default(),
            debug: false,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_package_manager(mut self, package_manager: PackageManager) -> Self {
        self.package_manager = package_manager;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Options handed to a lifecycle hook
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOptions {
    #[serde(flatten)]
    pub cli: CliOptions,
    pub production: bool,
    pub watch: bool,
    pub src: PathBuf,
    pub dest: PathBuf,
    /// Command-specific values that have no dedicated field
    pub extra: Map<String, Value>,
}

impl HookOptions {
    /// Defaults: `src/` and `build/` under the working directory, development mode
    pub fn from_cli(cli: &CliOptions) -> Self {
        Self {
            src: cli.cwd.join("src"),
            dest: cli.cwd.join("build"),
            cli: cli.clone(),
            production: false,
            watch: false,
            extra: Map::new(),
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cli.cwd
    }

    pub fn package_manager(&self) -> PackageManager {
        self.cli.package_manager
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_src(mut self, src: impl Into<PathBuf>) -> Self {
        self.src = src.into();
        self
    }

    pub fn with_dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = dest.into();
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// "production" or "development"
    pub fn mode(&self) -> &'static str {
        if self.production {
            "production"
        } else {
            "development"
        }
    }
}
