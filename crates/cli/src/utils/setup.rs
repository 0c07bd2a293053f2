use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use orbit_core::config::merge_replacing_arrays;
use orbit_core::package_manager::{PackageManager, exec};

const GIT_AUTHOR_NAME: &str = "Orbit CLI";
const GIT_AUTHOR_EMAIL: &str = "orbit-cli@users.noreply.github.com";

/// Manifest keys the `install` hook may contribute to
const DEPENDENCY_KEYS: [&str; 2] = ["dependencies", "devDependencies"];

/// Package scripts of a generated project
pub fn add_scripts(pm: PackageManager) -> Value {
    json!({
        "build": "orbit build",
        "start": format!(
            "if-env NODE_ENV=production && {} || {}",
            pm.run_command("serve", &["-s"]),
            pm.run_command("watch", &["-s"])
        ),
        "watch": "orbit watch",
    })
}

/// Merges dependency maps returned by `install` hooks into
/// `<dir>/package.json`. Keys other than the dependency maps are ignored.
///
/// Returns whether anything was merged.
pub fn merge_dependencies<I>(dir: &Path, additions: I) -> Result<bool>
where
    I: IntoIterator<Item = Value>,
{
    let mut patch = json!({});
    let mut changed = false;
    for addition in additions {
        let Value::Object(map) = addition else {
            continue;
        };
        for (key, value) in map {
            if DEPENDENCY_KEYS.contains(&key.as_str()) && value.is_object() {
                merge_replacing_arrays(&mut patch, json!({ key: value }));
                changed = true;
            }
        }
    }
    if !changed {
        return Ok(false);
    }

    let path = dir.join("package.json");
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut manifest: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    merge_replacing_arrays(&mut manifest, patch);
    write_manifest(&path, &manifest)?;
    Ok(true)
}

/// Writes a manifest tab-indented, the way package managers keep it.
pub fn write_manifest(path: &Path, manifest: &Value) -> Result<()> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    manifest
        .serialize(&mut serializer)
        .context("Failed to serialize package.json")?;
    buffer.push(b'\n');
    fs::write(path, buffer).with_context(|| format!("Failed to write {}", path.display()))
}

/// Initialises a repository with an initial commit.
///
/// Returns false when git is not installed.
pub fn init_git(folder: &Path) -> Result<bool> {
    if which::which("git").is_err() {
        debug!("git not found in PATH");
        return Ok(false);
    }

    exec("git init", Some(folder))?;
    exec("git add -A", Some(folder))?;

    let committer_name = exec("git config user.name", Some(folder))
        .map(|out| out.stdout)
        .unwrap_or_else(|_| GIT_AUTHOR_NAME.to_string());
    let committer_email = exec("git config user.email", Some(folder))
        .map(|out| out.stdout)
        .unwrap_or_else(|_| GIT_AUTHOR_EMAIL.to_string());

    let status = Command::new("git")
        .args(["commit", "-m", "Initial commit from Orbit CLI"])
        .current_dir(folder)
        .env("GIT_COMMITTER_NAME", committer_name)
        .env("GIT_COMMITTER_EMAIL", committer_email)
        .env("GIT_AUTHOR_NAME", GIT_AUTHOR_NAME)
        .env("GIT_AUTHOR_EMAIL", GIT_AUTHOR_EMAIL)
        .output()
        .context("Failed to run git commit")?;

    if !status.status.success() {
        anyhow::bail!(
            "git commit failed: {}",
            String::from_utf8_lossy(&status.stderr).trim()
        );
    }
    Ok(true)
}
