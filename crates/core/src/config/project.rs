//! Project-level `orbit.config.json`
//!
//! ```json
//! {
//!   "build": { "resolve": { "alias": { "@": "src" } } },
//!   "env": {
//!     "production": { "devtool": false },
//!     "development": { "devServer": { "port": 3000 } }
//!   }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

pub const PROJECT_CONFIG_FILE: &str = "orbit.config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Merged into every build configuration
    pub build: Map<String, Value>,
    /// Merged after `build`, keyed by `production` / `development`
    pub env: Map<String, Value>,
}

impl ProjectConfig {
    /// Config file path in `root`, if present
    pub fn find(root: &Path) -> Option<PathBuf> {
        let path = root.join(PROJECT_CONFIG_FILE);
        path.is_file().then_some(path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| Error::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the config of `root`. A missing file yields `None`.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        match Self::find(root) {
            Some(path) => {
                debug!("Loading project config from {:?}", path);
                Self::load_from_file(&path).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Partials to merge, in order, for the given mode
    pub fn partials(&self, mode: &str) -> Vec<Value> {
        let mut partials = Vec::new();
        if !self.build.is_empty() {
            partials.push(Value::Object(self.build.clone()));
        }
        if let Some(overrides @ Value::Object(_)) = self.env.get(mode) {
            partials.push(overrides.clone());
        }
        partials
    }
}
