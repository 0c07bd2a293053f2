//! Shared command registration surface
//!
//! All plugins register into one namespace. The first registration of a name
//! wins; later ones are dropped and reported on the registering plugin's
//! status channel.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::args::CommandArgs;
use super::signature::{CommandSignature, OptionSpec};
use crate::status::StatusReporter;

/// Callback run when a command is dispatched
pub type CommandAction = Arc<dyn Fn(CommandArgs) -> anyhow::Result<()> + Send + Sync>;

/// Registration settings of a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    /// Left out of help output
    pub hidden: bool,
    pub aliases: Vec<String>,
}

impl CommandOptions {
    pub fn hidden() -> Self {
        Self {
            hidden: true,
            ..Self::default()
        }
    }
}

/// A registered command
#[derive(Clone)]
pub struct CommandSpec {
    pub signature: CommandSignature,
    pub description: Option<String>,
    pub options: Vec<OptionSpec>,
    pub settings: CommandOptions,
    /// Id of the plugin that registered the command
    pub owner: String,
    action: CommandAction,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("signature", &self.signature)
            .field("description", &self.description)
            .field("options", &self.options)
            .field("settings", &self.settings)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl CommandSpec {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn run(&self, args: CommandArgs) -> anyhow::Result<()> {
        (self.action)(args)
    }
}

#[derive(Default)]
pub struct CommandSurface {
    commands: Mutex<IndexMap<String, CommandSpec>>,
}

impl fmt::Debug for CommandSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSurface")
            .field("commands", &self.names())
            .finish()
    }
}

impl CommandSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Starts a command registration on behalf of `owner`.
    pub fn command(
        self: &Arc<Self>,
        owner: &str,
        signature: &str,
        settings: CommandOptions,
    ) -> CommandBuilder {
        CommandBuilder {
            surface: Arc::clone(self),
            owner: owner.to_string(),
            raw: signature.to_string(),
            signature: CommandSignature::parse(signature),
            description: None,
            options: Vec::new(),
            settings,
            reporter: None,
        }
    }

    /// Adds a finished spec. On collision the existing owner is returned and
    /// the new spec is dropped.
    pub fn register(&self, spec: CommandSpec) -> Result<(), String> {
        let mut commands = self.commands.lock();
        if let Some(existing) = commands.get(spec.name()) {
            return Err(existing.owner.clone());
        }
        debug!("Registered command `{}` from {}", spec.name(), spec.owner);
        commands.insert(spec.name().to_string(), spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<CommandSpec> {
        let commands = self.commands.lock();
        commands.get(name).cloned().or_else(|| {
            commands
                .values()
                .find(|spec| spec.settings.aliases.iter().any(|a| a == name))
                .cloned()
        })
    }

    /// Registered commands in registration order
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.commands.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    /// Runs the action of a registered command.
    ///
    /// The lock is released before the action runs, so actions may register
    /// further commands.
    pub fn dispatch(&self, name: &str, args: CommandArgs) -> anyhow::Result<()> {
        let spec = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown command `{name}`"))?;
        spec.run(args)
    }
}

/// Builder returned by command registration
#[must_use = "a command is only registered once `action` is called"]
pub struct CommandBuilder {
    surface: Arc<CommandSurface>,
    owner: String,
    raw: String,
    signature: Option<CommandSignature>,
    description: Option<String>,
    options: Vec<OptionSpec>,
    settings: CommandOptions,
    reporter: Option<Arc<StatusReporter>>,
}

impl CommandBuilder {
    /// Status channel that receives collision and parse errors
    pub fn reporter(mut self, reporter: Arc<StatusReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.settings.aliases.push(alias.into());
        self
    }

    /// Adds an option from commander-style flags such as `-d, --dest <dir>`.
    pub fn option(mut self, flags: &str, description: &str) -> Self {
        match OptionSpec::parse(flags, description) {
            Some(spec) => self.options.push(spec),
            None => warn!("Ignoring malformed option {:?} on `{}`", flags, self.raw),
        }
        self
    }

    pub fn option_with_default(
        mut self,
        flags: &str,
        description: &str,
        default: impl Into<String>,
    ) -> Self {
        match OptionSpec::parse(flags, description) {
            Some(mut spec) => {
                spec.default = Some(default.into());
                self.options.push(spec);
            }
            None => warn!("Ignoring malformed option {:?} on `{}`", flags, self.raw),
        }
        self
    }

    /// Attaches the action and registers the command.
    ///
    /// Returns false when the signature is malformed or the name is already
    /// taken.
    pub fn action<F>(self, action: F) -> bool
    where
        F: Fn(CommandArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let Some(signature) = self.signature else {
            warn!("Invalid command signature {:?} from {}", self.raw, self.owner);
            self.report(&format!("Invalid command signature \"{}\"", self.raw));
            return false;
        };

        let name = signature.name.clone();
        let spec = CommandSpec {
            signature,
            description: self.description,
            options: self.options,
            settings: self.settings,
            owner: self.owner.clone(),
            action: Arc::new(action),
        };

        match self.surface.register(spec) {
            Ok(()) => true,
            Err(existing) => {
                warn!(
                    "Command `{}` from {} collides with {}, keeping the first",
                    name, self.owner, existing
                );
                if let Some(reporter) = &self.reporter {
                    reporter.error(&format!(
                        "Command \"{name}\" is already registered by {existing}, ignoring"
                    ));
                }
                false
            }
        }
    }

    fn report(&self, text: &str) {
        if let Some(reporter) = &self.reporter {
            reporter.error(text);
        }
    }
}
