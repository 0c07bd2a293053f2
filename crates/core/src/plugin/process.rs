//! Out-of-process plugins
//!
//! Plugins that are not compiled in are executables speaking JSON over
//! stdin/stdout:
//!
//! - `<entry> --manifest` prints a [`ProcessManifest`] listing the hooks and
//!   commands the plugin implements.
//! - Each call writes one [`HookRequest`] line to stdin and reads one
//!   [`HookResponse`] line from stdout.
//!
//! `.js`, `.mjs` and `.cjs` entries are run with `node`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::handle::PluginHandle;
use super::module::{HookFn, ModuleLoader, PluginDescriptor, PluginModule, hooks};
use crate::command::CommandArgs;
use crate::error::{Error, Result};
use crate::options::HookOptions;

/// Hook name used to run a command registered through the manifest
pub const COMMAND_HOOK: &str = "command";

/// Capabilities declared by a process plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    /// Hooks the plugin implements
    pub hooks: Vec<String>,
    /// Commands registered when the `cli` hook runs
    pub commands: Vec<ManifestCommand>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestCommand {
    pub signature: String,
    pub description: Option<String>,
    pub options: Vec<ManifestOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestOption {
    pub flags: String,
    pub description: String,
    pub default: Option<String>,
}

/// Message sent to a process plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookRequest {
    pub hook: String,
    pub options: Value,
}

/// Reply of a process plugin
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Partials registered as merge chains on the plugin handle
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chains: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Loads plugins by spawning their entry
#[derive(Debug, Clone, Default)]
pub struct ProcessLoader {
    node: Option<PathBuf>,
}

impl ProcessLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpreter used for JavaScript entries instead of `node` from PATH
    pub fn with_node(mut self, node: impl Into<PathBuf>) -> Self {
        self.node = Some(node.into());
        self
    }

    fn command(&self, entry: &Path) -> Command {
        let is_script = matches!(
            entry.extension().and_then(|e| e.to_str()),
            Some("js" | "mjs" | "cjs")
        );
        if is_script {
            let mut cmd = Command::new(self.node.as_deref().unwrap_or(Path::new("node")));
            cmd.arg(entry);
            cmd
        } else {
            Command::new(entry)
        }
    }

    /// Runs `<entry> --manifest`.
    pub fn manifest(&self, entry: &Path) -> anyhow::Result<ProcessManifest> {
        let output = self
            .command(entry)
            .arg("--manifest")
            .output()
            .with_context(|| format!("Failed to execute plugin: {}", entry.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Plugin returned error: {}", stderr.trim());
        }

        serde_json::from_slice(&output.stdout).context("Failed to parse plugin manifest")
    }

    /// Sends one request and waits for the plugin to exit.
    ///
    /// A non-zero exit fails the call even when a response was printed.
    pub fn execute(
        &self,
        entry: &Path,
        cwd: &Path,
        request: &HookRequest,
    ) -> anyhow::Result<HookResponse> {
        let mut child = self
            .command(entry)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn plugin: {}", entry.display()))?;

        let written = write_request(&mut child, request);
        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for plugin: {}", entry.display()))?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            anyhow::bail!("Plugin exited with {}: {}", output.status, stderr.trim());
        }
        if let Err(err) = written {
            debug!("{}: {:#}", entry.display(), err);
        }
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", entry.display(), stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let response_line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .context("No response from plugin")?;
        serde_json::from_str(response_line).context("Failed to parse plugin response")
    }

    fn hook_fn(&self, entry: PathBuf, hook: String) -> HookFn {
        let loader = self.clone();
        Arc::new(move |handle: &PluginHandle, options: &HookOptions| {
            let request = HookRequest {
                hook: hook.clone(),
                options: serde_json::to_value(options)?,
            };
            let response = loader.execute(&entry, options.cwd(), &request)?;
            apply_response(handle, response)
        })
    }

    fn cli_hook(&self, entry: PathBuf, manifest: ProcessManifest, forward: bool) -> HookFn {
        let loader = self.clone();
        Arc::new(move |handle: &PluginHandle, options: &HookOptions| {
            for command in &manifest.commands {
                register_manifest_command(&loader, &entry, handle, options, command);
            }
            if forward {
                let request = HookRequest {
                    hook: hooks::CLI.to_string(),
                    options: serde_json::to_value(options)?,
                };
                let response = loader.execute(&entry, options.cwd(), &request)?;
                return apply_response(handle, response);
            }
            Ok(None)
        })
    }
}

/// Writes the request line and closes stdin.
fn write_request(child: &mut Child, request: &HookRequest) -> anyhow::Result<()> {
    let mut stdin = child.stdin.take().context("Failed to open plugin stdin")?;
    let request_json = serde_json::to_string(request).context("Failed to serialize request")?;
    writeln!(stdin, "{request_json}").context("Failed to write to plugin")
}

fn apply_response(handle: &PluginHandle, response: HookResponse) -> anyhow::Result<Option<Value>> {
    if !response.success {
        anyhow::bail!(
            response
                .error
                .unwrap_or_else(|| "plugin reported failure".to_string())
        );
    }
    for partial in response.chains {
        handle.chain_merge(partial);
    }
    Ok(response.data)
}

fn register_manifest_command(
    loader: &ProcessLoader,
    entry: &Path,
    handle: &PluginHandle,
    options: &HookOptions,
    command: &ManifestCommand,
) {
    let mut builder = handle.register_command(&command.signature);
    if let Some(description) = &command.description {
        builder = builder.description(description);
    }
    for option in &command.options {
        builder = match &option.default {
            Some(default) => builder.option_with_default(&option.flags, &option.description, default),
            None => builder.option(&option.flags, &option.description),
        };
    }

    let loader = loader.clone();
    let entry = entry.to_path_buf();
    let options = options.clone();
    let name = command
        .signature
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();

    let _ = builder.action(move |args: CommandArgs| {
        let mut payload = serde_json::to_value(&options)?;
        if let Value::Object(map) = &mut payload {
            map.insert("command".to_string(), Value::String(name.clone()));
            map.insert("args".to_string(), args_to_value(&args));
        }
        let request = HookRequest {
            hook: COMMAND_HOOK.to_string(),
            options: payload,
        };
        let response = loader.execute(&entry, options.cwd(), &request)?;
        if !response.success {
            anyhow::bail!(
                response
                    .error
                    .unwrap_or_else(|| format!("command {name} failed"))
            );
        }
        Ok(())
    });
}

fn args_to_value(args: &CommandArgs) -> Value {
    let mut map = Map::new();
    for (key, values) in args.positionals() {
        let values = values.iter().cloned().map(Value::String).collect();
        map.insert(key.clone(), Value::Array(values));
    }
    for (key, value) in args.options() {
        map.insert(key.clone(), value.clone());
    }
    Value::Object(map)
}

impl ModuleLoader for ProcessLoader {
    fn load(&self, descriptor: &PluginDescriptor) -> Result<PluginModule> {
        let to_load_error = |err: anyhow::Error| Error::PluginLoad {
            id: descriptor.id.clone(),
            message: format!("{err:#}"),
        };

        let manifest = self.manifest(&descriptor.entry).map_err(to_load_error)?;
        debug!(
            "Loaded process plugin {} with hooks {:?}",
            descriptor.id, manifest.hooks
        );

        let mut module = PluginModule::new();
        for hook in &manifest.hooks {
            if hook == hooks::CLI {
                continue;
            }
            module.insert_hook(
                hook.clone(),
                self.hook_fn(descriptor.entry.clone(), hook.clone()),
            );
        }

        let forward_cli = manifest.hooks.iter().any(|h| h == hooks::CLI);
        if forward_cli || !manifest.commands.is_empty() {
            module.insert_hook(
                hooks::CLI,
                self.cli_hook(descriptor.entry.clone(), manifest, forward_cli),
            );
        }

        Ok(module)
    }
}
