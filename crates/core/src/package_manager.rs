//! Package manager abstraction
//!
//! Produces the shell command strings for npm and yarn and runs them,
//! capturing trimmed stdout/stderr.

use std::fmt;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Supported package managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Npm,
    Yarn,
}

/// Captured output of a finished shell command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl PackageManager {
    /// Selects a package manager by name. Unknown names fall back to npm.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "yarn" => PackageManager::Yarn,
            "npm" => PackageManager::Npm,
            other => {
                debug!("Unknown package manager {:?}, using npm", other);
                PackageManager::Npm
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
        }
    }

    pub fn install_command(&self) -> String {
        match self {
            PackageManager::Npm => "npm i".to_string(),
            PackageManager::Yarn => "yarn".to_string(),
        }
    }

    pub fn add_command<S: AsRef<str>>(&self, dev: bool, packages: &[S]) -> String {
        let prefix = match (self, dev) {
            (PackageManager::Npm, true) => "npm i --save-dev",
            (PackageManager::Npm, false) => "npm i --save",
            (PackageManager::Yarn, true) => "yarn add --dev",
            (PackageManager::Yarn, false) => "yarn add",
        };
        join_command(prefix, packages)
    }

    pub fn remove_command<S: AsRef<str>>(&self, packages: &[S]) -> String {
        let prefix = match self {
            PackageManager::Npm => "npm r --save",
            PackageManager::Yarn => "yarn remove",
        };
        join_command(prefix, packages)
    }

    /// Command running a package script, with extra arguments appended verbatim
    pub fn run_command<S: AsRef<str>>(&self, script: &str, extra_args: &[S]) -> String {
        let prefix = match self {
            PackageManager::Npm => format!("npm run {script}"),
            PackageManager::Yarn => format!("yarn {script}"),
        };
        join_command(prefix.trim_end(), extra_args)
    }

    pub fn run_install(&self, cwd: Option<&Path>) -> Result<CommandOutput> {
        exec(&self.install_command(), cwd)
    }

    pub fn run_add<S: AsRef<str>>(
        &self,
        dev: bool,
        cwd: Option<&Path>,
        packages: &[S],
    ) -> Result<CommandOutput> {
        exec(&self.add_command(dev, packages), cwd)
    }

    pub fn run_remove<S: AsRef<str>>(
        &self,
        cwd: Option<&Path>,
        packages: &[S],
    ) -> Result<CommandOutput> {
        exec(&self.remove_command(packages), cwd)
    }

    pub fn run_script<S: AsRef<str>>(
        &self,
        script: &str,
        cwd: Option<&Path>,
        extra_args: &[S],
    ) -> Result<CommandOutput> {
        exec(&self.run_command(script, extra_args), cwd)
    }

    /// Version reported by the package manager binary
    pub fn version(&self) -> Result<String> {
        exec(&format!("{} --version", self.name()), None).map(|out| out.stdout)
    }
}

impl FromStr for PackageManager {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn join_command<S: AsRef<str>>(prefix: &str, parts: &[S]) -> String {
    let mut cmd = String::from(prefix);
    for part in parts {
        let part = part.as_ref();
        if part.is_empty() {
            continue;
        }
        cmd.push(' ');
        cmd.push_str(part);
    }
    cmd
}

/// Runs a command line through the platform shell.
///
/// A non-zero exit becomes [`Error::CommandExecution`] carrying both streams.
pub fn exec(command: &str, cwd: Option<&Path>) -> Result<CommandOutput> {
    debug!("Executing {:?} in {:?}", command, cwd);

    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd.output()?;
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        return Err(Error::CommandExecution {
            command: command.to_string(),
            code: output.status.code(),
            stdout,
            stderr,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_name_falls_back_to_npm() {
        assert_eq!(PackageManager::from_name("yarn"), PackageManager::Yarn);
        assert_eq!(PackageManager::from_name(" NPM "), PackageManager::Npm);
        assert_eq!(PackageManager::from_name("pnpm"), PackageManager::Npm);
        assert_eq!("bun".parse::<PackageManager>().unwrap(), PackageManager::Npm);
    }

    #[test]
    fn test_npm_commands() {
        let pm = PackageManager::Npm;
        assert_eq!(pm.install_command(), "npm i");
        assert_eq!(pm.add_command(true, &["a", "b"]), "npm i --save-dev a b");
        assert_eq!(pm.add_command(false, &["a"]), "npm i --save a");
        assert_eq!(pm.remove_command(&["a"]), "npm r --save a");
        assert_eq!(pm.run_command("serve", &["-s"]), "npm run serve -s");
        assert_eq!(pm.run_command::<&str>("dev", &[]), "npm run dev");
    }

    #[test]
    fn test_yarn_commands() {
        let pm = PackageManager::Yarn;
        assert_eq!(pm.install_command(), "yarn");
        assert_eq!(pm.add_command(true, &["a"]), "yarn add --dev a");
        assert_eq!(pm.add_command(false, &["a", "b"]), "yarn add a b");
        assert_eq!(pm.remove_command(&["a"]), "yarn remove a");
        assert_eq!(pm.run_command("watch", &["-s"]), "yarn watch -s");
    }

    #[test]
    fn test_empty_parts_are_skipped() {
        assert_eq!(PackageManager::Npm.add_command(false, &[""]), "npm i --save");
        assert_eq!(PackageManager::Yarn.run_command::<&str>("", &[]), "yarn");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_captures_trimmed_streams() {
        let out = exec("echo '  hello  '; echo oops 1>&2", None).unwrap();
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stderr, "oops");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_failure_carries_both_streams() {
        let err = exec("echo partial; echo broken 1>&2; exit 3", None).unwrap_err();
        match err {
            Error::CommandExecution {
                code,
                stdout,
                stderr,
                ..
            } => {
                assert_eq!(code, Some(3));
                assert_eq!(stdout, "partial");
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
