//! Chains the project's `orbit.config.json` into the build configuration

use std::path::PathBuf;

use tracing::debug;

use orbit_core::config::ProjectConfig;
use orbit_core::plugin::{PluginHandle, PluginModule, hooks};
use orbit_core::HookOptions;

pub const ID: &str = "@orbit/cli:config";

pub fn module() -> PluginModule {
    PluginModule::new()
        .with_hook(hooks::BUILD, |handle, options| {
            chain_project_config(handle, options);
            Ok(None)
        })
        .with_hook(hooks::WATCH, |handle, options| {
            chain_project_config(handle, options);
            Ok(None)
        })
}

/// The file is read when the chain runs, so a watch rebuild sees edits.
fn chain_project_config(handle: &PluginHandle, options: &HookOptions) {
    let root: PathBuf = options.cwd().to_path_buf();
    let mode = options.mode();
    handle.chain_configuration(move |config| {
        let Some(project) = ProjectConfig::load(&root)? else {
            return Ok(None);
        };
        for partial in project.partials(mode) {
            debug!("Merging project config partial for {} mode", mode);
            config.merge(partial);
        }
        Ok(None)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_core::command::CommandSurface;
    use orbit_core::status::MemorySink;
    use orbit_core::{BuildConfig, CliOptions};
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn merged(dir: &std::path::Path, production: bool) -> anyhow::Result<BuildConfig> {
        let handle = PluginHandle::new(
            ID,
            dir,
            dir,
            CommandSurface::new(),
            Arc::new(MemorySink::new()),
        );
        let options = HookOptions::from_cli(&CliOptions::new(dir)).with_production(production);
        module().hook(hooks::BUILD).unwrap()(&handle, &options)?;

        let mut config = BuildConfig::from_value(json!({"devtool": "eval"}));
        for chain in handle.get_chains() {
            chain(&mut config)?;
        }
        Ok(config)
    }

    #[test]
    fn test_missing_file_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = merged(dir.path(), false).unwrap();
        assert_eq!(config.to_value(), json!({"devtool": "eval"}));
    }

    #[test]
    fn test_env_overrides_apply_after_build_section() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("orbit.config.json"),
            r#"{
                "build": {"devtool": "source-map", "resolve": {"alias": {"@": "src"}}},
                "env": {"production": {"devtool": false}}
            }"#,
        )
        .unwrap();

        let development = merged(dir.path(), false).unwrap();
        assert_eq!(development.get("/devtool"), Some(&json!("source-map")));
        assert_eq!(development.get("/resolve/alias/@"), Some(&json!("src")));

        let production = merged(dir.path(), true).unwrap();
        assert_eq!(production.get("/devtool"), Some(&json!(false)));
    }

    #[test]
    fn test_malformed_file_fails_the_chain() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("orbit.config.json"), "{ nope").unwrap();
        assert!(merged(dir.path(), false).is_err());
    }
}
