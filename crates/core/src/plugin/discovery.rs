//! Finding plugins declared by a project
//!
//! A plugin is any dependency whose name starts with one of
//! [`PLUGIN_PREFIXES`]. Entries are resolved the way node resolves packages:
//! through every `node_modules` directory from the project root upward.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::package_manager;

/// Name of the project manifest
pub const MANIFEST_FILE: &str = "package.json";

/// Naming conventions of plugin packages
pub const PLUGIN_PREFIXES: [&str; 2] = ["@orbit/cli-plugin-", "orbit-cli-plugin-"];

/// Subset of `package.json` the CLI reads
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub main: Option<String>,
    /// A path, or a map of command name to path
    pub bin: Option<Value>,
    pub dependencies: IndexMap<String, String>,
    pub dev_dependencies: IndexMap<String, String>,
}

impl ProjectManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| Error::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Entry file relative to the package directory: `bin`, then `main`,
    /// then `index.js`
    pub fn entry(&self) -> PathBuf {
        let bin = match &self.bin {
            Some(Value::String(path)) => Some(path.as_str()),
            Some(Value::Object(map)) => map.values().find_map(Value::as_str),
            _ => None,
        };
        PathBuf::from(bin.or(self.main.as_deref()).unwrap_or("index.js"))
    }
}

/// Nearest `package.json` at or above `start`
pub fn find_manifest(start: &Path) -> Result<PathBuf> {
    let mut current = start;
    loop {
        let candidate = current.join(MANIFEST_FILE);
        if candidate.is_file() {
            return Ok(candidate);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return Err(Error::ManifestNotFound(start.to_path_buf())),
        }
    }
}

pub fn is_plugin_name(name: &str) -> bool {
    PLUGIN_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix) && name.len() > prefix.len())
}

/// Full package names a short plugin name may refer to, in lookup order
pub fn plugin_name_candidates(short: &str) -> [String; 2] {
    PLUGIN_PREFIXES.map(|prefix| format!("{prefix}{short}"))
}

/// Plugins found in a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredPlugins {
    /// Global packages, then regular dependencies, then dev dependencies;
    /// each in declaration order, without duplicates
    pub names: Vec<String>,
    /// Plugins declared as regular dependencies
    pub in_dependencies: Vec<String>,
}

pub fn declared_plugins(manifest: &ProjectManifest, global: &[String]) -> DeclaredPlugins {
    let in_dependencies: Vec<String> = manifest
        .dependencies
        .keys()
        .filter(|name| is_plugin_name(name))
        .cloned()
        .collect();

    let mut names: IndexSet<String> = global
        .iter()
        .filter(|name| is_plugin_name(name))
        .cloned()
        .collect();
    names.extend(in_dependencies.iter().cloned());
    names.extend(
        manifest
            .dev_dependencies
            .keys()
            .filter(|name| is_plugin_name(name))
            .cloned(),
    );

    DeclaredPlugins {
        names: names.into_iter().collect(),
        in_dependencies,
    }
}

/// Every existing `node_modules` directory from `start` up to the root
pub fn node_modules_dirs(start: &Path) -> Vec<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join("node_modules"))
        .filter(|dir| dir.is_dir())
        .collect()
}

/// Resolves the entry of package `name` against `search_dirs`
/// (`node_modules` directories, nearest first).
pub fn resolve_entry(name: &str, search_dirs: &[PathBuf]) -> Result<PathBuf> {
    for dir in search_dirs {
        let package_dir = dir.join(name);
        let manifest_path = package_dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            continue;
        }

        let manifest = ProjectManifest::load(&manifest_path)?;
        let entry = package_dir.join(manifest.entry());
        debug!("Resolving plugin {} to {:?}", name, entry);
        return Ok(entry);
    }

    Err(Error::PluginLoad {
        id: name.to_string(),
        message: "cannot resolve module entry".to_string(),
    })
}

/// `node_modules` directory of the global npm prefix
pub fn global_modules_dir(prefix: &Path) -> PathBuf {
    if cfg!(windows) {
        prefix.join("node_modules")
    } else {
        prefix.join("lib").join("node_modules")
    }
}

/// Package names installed under a global `node_modules` directory
pub fn packages_in(modules_dir: &Path) -> Vec<String> {
    let root = modules_dir.to_string_lossy().replace('\\', "/");
    let patterns = [
        format!("{root}/*/{MANIFEST_FILE}"),
        format!("{root}/@*/*/{MANIFEST_FILE}"),
    ];

    let mut names = Vec::new();
    for pattern in &patterns {
        let Ok(paths) = glob::glob(pattern) else {
            warn!("Invalid glob pattern {:?}", pattern);
            continue;
        };
        for path in paths.flatten() {
            let Some(package_dir) = path.parent() else {
                continue;
            };
            if let Ok(relative) = package_dir.strip_prefix(modules_dir) {
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                names.push(name);
            }
        }
    }
    names.sort();
    names
}

/// Globally installed packages, via `npm prefix --global`
pub fn global_packages() -> Result<(PathBuf, Vec<String>)> {
    let prefix = PathBuf::from(package_manager::exec("npm prefix --global", None)?.stdout);
    let modules_dir = global_modules_dir(&prefix);
    let packages = packages_in(&modules_dir);
    debug!("Global packages: {:?}", packages);
    Ok((modules_dir, packages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_plugin_names() {
        assert!(is_plugin_name("@orbit/cli-plugin-sass"));
        assert!(is_plugin_name("orbit-cli-plugin-less"));
        assert!(!is_plugin_name("orbit-cli-plugin-"));
        assert!(!is_plugin_name("webpack"));
        assert_eq!(
            plugin_name_candidates("sass"),
            ["@orbit/cli-plugin-sass", "orbit-cli-plugin-sass"]
        );
    }

    #[test]
    fn test_find_manifest_walks_upward() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("package.json"), "{}");
        let nested = dir.path().join("src/components");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_manifest(&nested).unwrap(), dir.path().join("package.json"));
    }

    #[test]
    fn test_find_manifest_missing() {
        let dir = TempDir::new().unwrap();
        // A temp dir may live below a directory with its own package.json.
        if dir.path().ancestors().any(|d| d.join(MANIFEST_FILE).is_file()) {
            return;
        }
        assert!(matches!(
            find_manifest(dir.path()),
            Err(Error::ManifestNotFound(_))
        ));
    }

    #[test]
    fn test_declared_plugins_order_and_dedup() {
        let manifest: ProjectManifest = serde_json::from_str(
            r#"{
                "dependencies": {"orbit-cli-plugin-b": "1", "react": "18"},
                "devDependencies": {
                    "@orbit/cli-plugin-z": "1",
                    "orbit-cli-plugin-b": "1",
                    "@orbit/cli-plugin-a": "1"
                }
            }"#,
        )
        .unwrap();

        let declared = declared_plugins(
            &manifest,
            &[
                "orbit-cli-plugin-g".to_string(),
                "@orbit/cli-plugin-a".to_string(),
                "left-pad".to_string(),
            ],
        );
        // A global package keeps its leading position when also declared.
        assert_eq!(
            declared.names,
            vec![
                "orbit-cli-plugin-g",
                "@orbit/cli-plugin-a",
                "orbit-cli-plugin-b",
                "@orbit/cli-plugin-z"
            ]
        );
        assert_eq!(declared.in_dependencies, vec!["orbit-cli-plugin-b"]);
    }

    #[test]
    fn test_manifest_entry_precedence() {
        let bin: ProjectManifest =
            serde_json::from_str(r#"{"bin": {"x": "bin/x.js"}, "main": "lib/index.js"}"#).unwrap();
        assert_eq!(bin.entry(), PathBuf::from("bin/x.js"));

        let main: ProjectManifest = serde_json::from_str(r#"{"main": "lib/index.js"}"#).unwrap();
        assert_eq!(main.entry(), PathBuf::from("lib/index.js"));

        assert_eq!(ProjectManifest::default().entry(), PathBuf::from("index.js"));
    }

    #[test]
    fn test_resolve_entry_through_ancestors() {
        let dir = TempDir::new().unwrap();
        write(
            &dir.path().join("node_modules/@orbit/cli-plugin-x/package.json"),
            r#"{"main": "dist/main.js"}"#,
        );
        let project = dir.path().join("apps/web");
        fs::create_dir_all(&project).unwrap();

        let search = node_modules_dirs(&project);
        let entry = resolve_entry("@orbit/cli-plugin-x", &search).unwrap();
        assert_eq!(
            entry,
            dir.path().join("node_modules/@orbit/cli-plugin-x/dist/main.js")
        );
        assert!(resolve_entry("missing", &search).is_err());
    }

    #[test]
    fn test_packages_in_global_dir() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("orbit-cli-plugin-g/package.json"), "{}");
        write(&dir.path().join("@orbit/cli-plugin-h/package.json"), "{}");
        fs::create_dir_all(dir.path().join("not-a-package")).unwrap();

        assert_eq!(
            packages_in(dir.path()),
            vec!["@orbit/cli-plugin-h", "orbit-cli-plugin-g"]
        );
    }
}
