use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn orbit(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("orbit").unwrap();
    cmd.env_remove("ORBIT_CWD")
        .env_remove("ORBIT_PACKAGE_MANAGER")
        .env_remove("RUST_LOG")
        .arg("--cwd")
        .arg(cwd);
    cmd
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_help_lists_builtin_commands() {
    let dir = TempDir::new().unwrap();
    orbit(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("build")
                .and(predicate::str::contains("watch"))
                .and(predicate::str::contains("invoke"))
                .and(predicate::str::contains("new"))
                .and(predicate::str::contains("info")),
        );
}

#[test]
fn test_unknown_command_fails() {
    let dir = TempDir::new().unwrap();
    orbit(dir.path()).arg("deploy").assert().failure();
}

#[test]
fn test_new_renders_project_without_install() {
    let dir = TempDir::new().unwrap();
    orbit(dir.path())
        .args(["new", "my-app", "--no-install", "--license", "ISC", "-f", "sass"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created project in"));

    let project = dir.path().join("my-app");
    let manifest = read_json(&project.join("package.json"));
    assert_eq!(manifest["name"], "my-app");
    assert_eq!(manifest["license"], "ISC");
    assert_eq!(manifest["devDependencies"]["@orbit/cli-plugin-sass"], "latest");
    assert_eq!(manifest["scripts"]["build"], "orbit build");

    let readme = fs::read_to_string(project.join("README.md")).unwrap();
    assert!(readme.starts_with("# my-app"));
    assert!(readme.contains("npm run watch"));
    assert!(project.join("src/index.js").is_file());
}

#[test]
fn test_build_merges_plugins_and_project_config() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{"name": "app", "devDependencies": {"@orbit/cli-plugin-sass": "1.0.0"}}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("orbit.config.json"),
        r#"{"build": {"resolve": {"alias": {"@": "src"}}}, "env": {"production": {"devtool": "source-map"}}}"#,
    )
    .unwrap();

    orbit(dir.path())
        .args(["build", "--production", "--dest", "dist"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No 'node_modules' folder found!"));

    let emitted = read_json(&dir.path().join("dist/orbit.build.json"));
    assert_eq!(emitted["mode"], "production");
    assert_eq!(emitted["devtool"], "source-map");
    assert_eq!(emitted["resolve"]["alias"]["@"], "src");
    assert_eq!(emitted["module"]["rules"]["sass"]["loader"], "sass-loader");
    assert_eq!(emitted["module"]["rules"]["sass"]["options"]["sourceMap"], false);
}

#[test]
fn test_build_clean_removes_previous_output() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), r#"{"name": "app"}"#).unwrap();
    fs::create_dir_all(dir.path().join("build")).unwrap();
    fs::write(dir.path().join("build/stale.js"), "old").unwrap();

    orbit(dir.path()).args(["build", "--clean"]).assert().success();

    assert!(!dir.path().join("build/stale.js").exists());
    assert!(dir.path().join("build/orbit.build.json").is_file());
}

#[test]
fn test_malformed_project_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), r#"{"name": "app"}"#).unwrap();
    fs::write(dir.path().join("orbit.config.json"), "{ not json").unwrap();

    orbit(dir.path())
        .arg("build")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to merge configuration"));
    assert!(!dir.path().join("build/orbit.build.json").exists());
}

#[test]
fn test_invoke_unknown_plugin_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), r#"{"name": "app"}"#).unwrap();

    orbit(dir.path())
        .args(["invoke", "nonexistent", "--hook", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Couldn't find plugin nonexistent"));
}
