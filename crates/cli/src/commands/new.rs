use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use anyhow::{Context, Result};
use console::style;
use serde_json::{Map, Value, json};
use tracing::debug;

use orbit_core::command::CommandArgs;
use orbit_core::package_manager::PackageManager;
use orbit_core::plugin::discovery::{is_plugin_name, plugin_name_candidates};
use orbit_core::plugin::{PluginHandle, hooks};
use orbit_core::status::StatusReporter;
use orbit_core::template::{self, TemplateVars};

use crate::context::CliContext;
use crate::utils::{add_scripts, init_git, merge_dependencies};

pub const ID: &str = "@orbit/cli:new";

/// Template rendered when `--template` is not given
pub const DEFAULT_TEMPLATE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/base-project");

pub(super) fn register(handle: &PluginHandle, ctx: Weak<CliContext>) {
    let status = Arc::clone(handle.status());
    let _ = handle
        .register_command("new [name] [dir]")
        .description("Creates a new project")
        .option("--no-install", "Disable installation after project generation")
        .option_with_default("--license <license>", "Sets the project open-source license", "MIT")
        .option("--git", "Initialize a Git repository")
        .option("-f, --feature <plugin>", "Add a plugin to the project (repeatable)")
        .option("--template <dir>", "Render this template directory instead of the default")
        .action(move |args| {
            let ctx = super::upgrade(&ctx)?;
            new_command(&ctx, &status, &args)
        });
}

pub fn new_command(ctx: &CliContext, status: &StatusReporter, args: &CommandArgs) -> Result<()> {
    let (name, dir) = project_name_and_dir(args)?;
    let full_dir = ctx.cwd().join(&dir);
    let pm = ctx.options.package_manager;
    let features = feature_packages(&args.values("feature"));
    debug!("Features {:?}", features);

    status.progress(&format!(
        "Creating project in {}",
        style(full_dir.display()).magenta()
    ));
    fs::create_dir_all(&full_dir)
        .with_context(|| format!("Failed to create {}", full_dir.display()))?;

    let template_dir = args
        .value("template")
        .map(|dir| ctx.cwd().join(dir))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_DIR));
    let mut files = template::apply_template(&template_dir, &template_vars(&name, pm), &template_dir)?;

    let license = args.value("license").unwrap_or("MIT");
    let manifest = package_manifest(&name, license, &ctx.options.version, pm, &features);
    files.insert(
        "package.json".to_string(),
        serde_json::to_string_pretty(&manifest)?,
    );
    debug!("Writing file tree: {:?}", files.keys().collect::<Vec<_>>());
    template::write_file_tree(&files, &full_dir)?;

    let install = args.flag("install");
    if install {
        install_project(ctx, status, &full_dir)?;
    }

    if args.flag("git") {
        status.progress("Initializing git");
        if !init_git(&full_dir)? {
            status.info("git is not installed, skipping repository setup");
        }
    }

    status.done();
    status.success(&format!(
        "Created project in {}",
        style(full_dir.display()).magenta()
    ));
    status.info("You can now start working on your project!");
    status.info(&format!("\t{} {}", style("cd").green(), style(&dir).magenta()));
    if !install {
        let commands = [PackageManager::Npm, PackageManager::Yarn]
            .iter()
            .map(|pm| style(pm.install_command()).magenta().to_string())
            .collect::<Vec<_>>()
            .join(" or ");
        status.info(&format!("\tInstall dependencies with {commands}"));
        if !features.is_empty() {
            status.info(&format!(
                "\tYou also need to manually invoke plugins with {} after installing plugins.",
                style("orbit invoke").magenta()
            ));
        }
    }
    Ok(())
}

/// Installs dependencies, then lets the project's plugins contribute theirs.
fn install_project(ctx: &CliContext, status: &StatusReporter, dir: &Path) -> Result<()> {
    let pm = ctx.options.package_manager;

    status.progress("Installing dependencies");
    if let Err(err) = pm.run_install(Some(dir)) {
        status.error(&format!("Error! {err}"));
    }

    status.progress("Invoking plugins...");
    ctx.cache.invalidate();
    let registry = ctx.registry_at(dir);
    let added = registry.invoke(hooks::INSTALL, &ctx.hook_options_at(dir));
    if merge_dependencies(dir, added.into_iter().flatten())? {
        status.progress("Installing plugins' additional dependencies...");
        if let Err(err) = pm.run_install(Some(dir)) {
            status.error(&format!("Error! {err}"));
        }
    }
    Ok(())
}

/// Name and target directory. Each defaults to the other.
fn project_name_and_dir(args: &CommandArgs) -> Result<(String, String)> {
    match (args.arg("name"), args.arg("dir")) {
        (Some(name), Some(dir)) => Ok((name.to_string(), dir.to_string())),
        (Some(name), None) => Ok((name.to_string(), name.to_string())),
        (None, Some(dir)) => {
            let name = Path::new(dir)
                .file_name()
                .and_then(|n| n.to_str())
                .context("Cannot derive a project name from the directory")?;
            Ok((name.to_string(), dir.to_string()))
        }
        (None, None) => anyhow::bail!("Please provide a project name: orbit new <name> [dir]"),
    }
}

/// Short names such as `sass` map to `@orbit/cli-plugin-sass`.
fn feature_packages(features: &[String]) -> Vec<String> {
    features
        .iter()
        .map(|feature| {
            if is_plugin_name(feature) {
                feature.clone()
            } else {
                let [scoped, _] = plugin_name_candidates(feature);
                scoped
            }
        })
        .collect()
}

fn template_vars(name: &str, pm: PackageManager) -> TemplateVars {
    let none: [&str; 0] = [];
    [
        ("name", name.to_string()),
        ("npm-install", pm.install_command()),
        ("npm-run-dev", pm.run_command("watch", &none)),
        ("npm-run-build", pm.run_command("build", &none)),
        ("npm-run-serve", pm.run_command("start", &none)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

fn package_manifest(
    name: &str,
    license: &str,
    version: &str,
    pm: PackageManager,
    features: &[String],
) -> Value {
    let mut dev_dependencies = Map::new();
    dev_dependencies.insert("if-env".to_string(), json!("latest"));
    dev_dependencies.insert("@orbit/cli".to_string(), json!(format!("^{version}")));
    for feature in features {
        dev_dependencies.insert(feature.clone(), json!("latest"));
    }

    json!({
        "name": name,
        "version": "0.1.0",
        "license": license,
        "author": {},
        "scripts": add_scripts(pm),
        "dependencies": {},
        "devDependencies": dev_dependencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_dir_default_to_each_other() {
        let args = CommandArgs::new().with_arg("name", "app");
        assert_eq!(
            project_name_and_dir(&args).unwrap(),
            ("app".to_string(), "app".to_string())
        );

        let args = CommandArgs::new().with_arg("dir", "projects/site");
        assert_eq!(
            project_name_and_dir(&args).unwrap(),
            ("site".to_string(), "projects/site".to_string())
        );

        assert!(project_name_and_dir(&CommandArgs::new()).is_err());
    }

    #[test]
    fn test_feature_short_names_are_scoped() {
        let features = feature_packages(&[
            "sass".to_string(),
            "orbit-cli-plugin-lint".to_string(),
        ]);
        assert_eq!(features, vec!["@orbit/cli-plugin-sass", "orbit-cli-plugin-lint"]);
    }

    #[test]
    fn test_manifest_lists_features_as_dev_dependencies() {
        let manifest = package_manifest(
            "app",
            "ISC",
            "1.2.0",
            PackageManager::Npm,
            &["@orbit/cli-plugin-sass".to_string()],
        );
        assert_eq!(manifest["license"], "ISC");
        assert_eq!(manifest["devDependencies"]["@orbit/cli"], "^1.2.0");
        assert_eq!(manifest["devDependencies"]["@orbit/cli-plugin-sass"], "latest");
        assert_eq!(manifest["scripts"]["watch"], "orbit watch");
    }

    #[test]
    fn test_default_template_renders() {
        let vars = template_vars("my-app", PackageManager::Yarn);
        let dir = Path::new(DEFAULT_TEMPLATE_DIR);
        let files = template::apply_template(dir, &vars, dir).unwrap();
        assert!(files.contains_key("src/index.js"));
        assert!(files["README.md"].contains("# my-app"));
        assert!(files["README.md"].contains("yarn watch"));
    }
}
