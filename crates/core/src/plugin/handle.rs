//! Per-plugin capability object

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::command::{CommandBuilder, CommandOptions, CommandSurface};
use crate::config::BuildConfig;
use crate::error::Result;
use crate::status::{StatusKind, StatusReporter, StatusSink};
use crate::template::{self, FileTree, TemplateVars};

/// Configuration transformation contributed by a plugin.
///
/// Returning `Some` replaces the accumulated configuration; returning `None`
/// keeps the (possibly mutated) one.
pub type ChainCallback =
    Arc<dyn Fn(&mut BuildConfig) -> anyhow::Result<Option<BuildConfig>> + Send + Sync>;

/// What a plugin uses to talk to the host: status output, templating,
/// command registration and configuration chaining.
pub struct PluginHandle {
    id: String,
    import_base: PathBuf,
    base: PathBuf,
    chains: Mutex<Vec<ChainCallback>>,
    status: Arc<StatusReporter>,
    commands: Arc<CommandSurface>,
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("id", &self.id)
            .field("import_base", &self.import_base)
            .field("base", &self.base)
            .field("chains", &self.chains.lock().len())
            .finish_non_exhaustive()
    }
}

impl PluginHandle {
    pub fn new(
        id: impl Into<String>,
        import_base: impl Into<PathBuf>,
        base: impl Into<PathBuf>,
        commands: Arc<CommandSurface>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let id = id.into();
        Self {
            status: Arc::new(StatusReporter::new(id.clone(), sink)),
            id,
            import_base: import_base.into(),
            base: base.into(),
            chains: Mutex::new(Vec::new()),
            commands,
        }
    }

    /// Package name of the plugin
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolved module entry
    pub fn import_base(&self) -> &Path {
        &self.import_base
    }

    /// Project root the plugin operates on
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Starts registering a command in the shared namespace.
    pub fn register_command(&self, signature: &str) -> CommandBuilder {
        self.register_command_with(signature, CommandOptions::default())
    }

    pub fn register_command_with(&self, signature: &str, options: CommandOptions) -> CommandBuilder {
        self.commands
            .command(&self.id, signature, options)
            .reporter(Arc::clone(&self.status))
    }

    /// Appends a chain callback. Nothing is evaluated until the merge.
    pub fn chain_configuration<F>(&self, callback: F)
    where
        F: Fn(&mut BuildConfig) -> anyhow::Result<Option<BuildConfig>> + Send + Sync + 'static,
    {
        self.chains.lock().push(Arc::new(callback));
    }

    /// Chains a deep merge of `partial` into the configuration.
    pub fn chain_merge(&self, partial: Value) {
        self.chain_configuration(move |config| {
            config.merge(partial.clone());
            Ok(None)
        });
    }

    /// Snapshot of the registered callbacks, in registration order
    pub fn get_chains(&self) -> Vec<ChainCallback> {
        self.chains.lock().clone()
    }

    /// Renders a template file or directory. Keys are relative to `base`,
    /// which defaults to the project root.
    pub fn apply_template(
        &self,
        path: &Path,
        vars: &TemplateVars,
        base: Option<&Path>,
    ) -> Result<FileTree> {
        debug!("{} applying template {:?}", self.id, path);
        template::apply_template(path, vars, base.unwrap_or(self.base.as_path()))
    }

    /// Writes a rendered tree below `base`, which defaults to the project root.
    pub fn write_file_tree(&self, files: &FileTree, base: Option<&Path>) -> Result<()> {
        template::write_file_tree(files, base.unwrap_or(self.base.as_path()))
    }

    pub fn set_status(&self, text: Option<&str>, kind: Option<StatusKind>) {
        self.status.set_status(text, kind);
    }

    pub fn status(&self) -> &Arc<StatusReporter> {
        &self.status
    }

    pub fn commands(&self) -> &Arc<CommandSurface> {
        &self.commands
    }
}
