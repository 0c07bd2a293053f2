use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Args, Command, Parser};
use tracing::{debug, warn};

use orbit_core::command::{CommandArgs, CommandSpec, CommandSurface, OptionSpec, OptionValue};
use orbit_core::plugin::{PluginRegistry, hooks};
use orbit_core::status::StatusSink;
use orbit_core::{CliOptions, PackageManager};

use crate::commands;
use crate::context::CliContext;

/// Options understood before any plugin is loaded
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "orbit")]
pub struct GlobalArgs {
    /// Sets working directory
    #[arg(long, env = "ORBIT_CWD", global = true)]
    pub cwd: Option<PathBuf>,

    /// Sets package manager
    #[arg(long = "pm", env = "ORBIT_PACKAGE_MANAGER", default_value = "npm", global = true)]
    pub pm: String,

    /// Activate debug options
    #[arg(short, long, global = true)]
    pub debug: bool,
}

const GLOBAL_IDS: [&str; 3] = ["cwd", "pm", "debug"];
const RESERVED_SHORTS: [char; 3] = ['d', 'h', 'V'];
const RESERVED_LONGS: [&str; 5] = ["cwd", "pm", "debug", "help", "version"];

impl GlobalArgs {
    /// Picks the global options out of a full command line, wherever they
    /// appear, so plugins can be discovered before the command is parsed.
    pub fn from_argv(argv: &[String]) -> std::result::Result<Self, clap::Error> {
        let mut picked = Vec::new();
        let mut tokens = argv.iter();
        picked.extend(tokens.next().cloned());
        while let Some(token) = tokens.next() {
            match token.as_str() {
                "--" => break,
                "--cwd" | "--pm" => {
                    picked.push(token.clone());
                    picked.extend(tokens.next().cloned());
                }
                "-d" | "--debug" => picked.push(token.clone()),
                t if t.starts_with("--cwd=") || t.starts_with("--pm=") => {
                    picked.push(token.clone())
                }
                _ => {}
            }
        }
        Self::try_parse_from(picked)
    }

    pub fn cli_options(&self) -> Result<CliOptions> {
        let cwd = match &self.cwd {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => env::current_dir()
                .context("Failed to get current directory")?
                .join(dir),
            None => env::current_dir().context("Failed to get current directory")?,
        };
        Ok(CliOptions::new(cwd)
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_package_manager(PackageManager::from_name(&self.pm))
            .with_debug(self.debug))
    }
}

/// Registers the built-in commands, then every discovered plugin's.
///
/// Built-ins register first, so a plugin cannot take over their names.
pub fn bootstrap(ctx: &Arc<CliContext>) -> Result<()> {
    let options = ctx.hook_options();

    let mut builtins = PluginRegistry::new(ctx.host.clone());
    for (id, module) in commands::modules(ctx) {
        debug!("Hooking internal plugin {}", id);
        let handle = ctx.host.handle(id, ctx.cwd(), ctx.cwd());
        builtins.add_preloaded(handle, module)?;
    }
    builtins.invoke_ordered(hooks::CLI, &options);

    ctx.registry().invoke_ordered(hooks::CLI, &options);
    Ok(())
}

/// The full command line parser for the registered commands
pub fn build_cli(surface: &CommandSurface) -> Command {
    let mut cli = GlobalArgs::augment_args(
        Command::new("orbit")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Plugin-extensible build orchestrator for frontend projects")
            .after_help("ENVIRONMENT:\n    RUST_LOG=orbit=debug    Enable debug logging"),
    )
    .subcommand_required(true)
    .arg_required_else_help(true);

    for spec in surface.commands() {
        cli = cli.subcommand(subcommand(&spec));
    }
    cli
}

fn positional_id(name: &str) -> String {
    format!("arg:{name}")
}

/// Options of `spec` that can be exposed without clashing with the global
/// options or with each other
fn usable_options(spec: &CommandSpec) -> Vec<OptionSpec> {
    let mut seen: HashSet<String> = GLOBAL_IDS.iter().map(|id| id.to_string()).collect();
    let mut shorts: HashSet<char> = RESERVED_SHORTS.into_iter().collect();
    let mut usable = Vec::new();

    for option in &spec.options {
        let long_taken = option
            .long
            .as_deref()
            .is_some_and(|long| RESERVED_LONGS.contains(&long));
        if long_taken || !seen.insert(option.key.clone()) {
            warn!(
                "Option {:?} of `{}` clashes with another option, ignoring",
                option.key,
                spec.name()
            );
            continue;
        }
        let mut option = option.clone();
        if let Some(short) = option.short {
            if !shorts.insert(short) {
                debug!("Dropping short flag -{} of `{}`", short, spec.name());
                option.short = None;
            }
        }
        usable.push(option);
    }
    usable
}

fn subcommand(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(spec.name().to_string()).hide(spec.settings.hidden);
    if let Some(description) = &spec.description {
        cmd = cmd.about(description.clone());
    }
    for alias in &spec.settings.aliases {
        cmd = cmd.visible_alias(alias.clone());
    }

    for arg in &spec.signature.args {
        let mut positional = Arg::new(positional_id(&arg.name))
            .value_name(arg.name.clone())
            .required(arg.required);
        if arg.variadic {
            positional = positional.num_args(1..).action(ArgAction::Append);
        }
        cmd = cmd.arg(positional);
    }

    for option in usable_options(spec) {
        cmd = cmd.arg(option_arg(&option));
    }
    cmd
}

fn option_arg(option: &OptionSpec) -> Arg {
    let mut arg = Arg::new(option.key.clone()).help(option.description.clone());
    if let Some(long) = &option.long {
        arg = arg.long(long.clone());
    }
    if let Some(short) = option.short {
        arg = arg.short(short);
    }

    match &option.value {
        OptionValue::Flag if option.negated => arg.action(ArgAction::SetFalse),
        OptionValue::Flag => {
            let arg = arg.action(ArgAction::SetTrue);
            match option.default.as_deref() {
                Some(default @ ("true" | "false")) => arg.default_value(default.to_string()),
                _ => arg,
            }
        }
        OptionValue::Required(name) | OptionValue::Optional(name) => {
            let mut arg = arg
                .value_name(name.clone())
                .action(ArgAction::Append);
            if matches!(option.value, OptionValue::Optional(_)) {
                let missing = option.default.clone().unwrap_or_else(|| "true".to_string());
                arg = arg.num_args(0..=1).default_missing_value(missing);
            }
            if let Some(default) = &option.default {
                arg = arg.default_value(default.clone());
            }
            arg
        }
    }
}

/// Converts the matches of one subcommand back into [`CommandArgs`].
pub fn command_args(spec: &CommandSpec, matches: &ArgMatches) -> CommandArgs {
    let mut args = CommandArgs::new();
    for arg in &spec.signature.args {
        if let Some(values) = matches.get_many::<String>(&positional_id(&arg.name)) {
            for value in values {
                args = args.with_arg(arg.name.clone(), value.clone());
            }
        }
    }

    for option in usable_options(spec) {
        match option.value {
            OptionValue::Flag => {
                args = args.with_flag(option.key.clone(), matches.get_flag(&option.key));
            }
            _ => {
                let values: Vec<String> = matches
                    .get_many::<String>(&option.key)
                    .map(|values| values.cloned().collect())
                    .unwrap_or_default();
                args = match values.as_slice() {
                    [] => args,
                    [value] => args.with_value(option.key.clone(), value.clone()),
                    _ => args.with_values(option.key.clone(), values),
                };
            }
        }
    }
    args
}

/// Parses `argv` against the registered commands and runs the chosen one.
///
/// Parse failures, help and version requests come back as a
/// [`clap::Error`] inside the returned error.
pub fn dispatch(surface: &CommandSurface, argv: &[String]) -> Result<()> {
    let matches = build_cli(surface).try_get_matches_from(argv)?;
    let Some((name, sub_matches)) = matches.subcommand() else {
        anyhow::bail!("No command given");
    };
    let spec = surface
        .get(name)
        .with_context(|| format!("Unknown command `{name}`"))?;
    debug!("Dispatching `{}` from {}", name, spec.owner);
    spec.run(command_args(&spec, sub_matches))
}

/// Entry point behind the `orbit` binary
pub fn run(globals: &GlobalArgs, argv: &[String], sink: Arc<dyn StatusSink>) -> Result<()> {
    let options = globals.cli_options()?;
    debug!("opts {:?}", options);
    let ctx = Arc::new(CliContext::new(options, sink));
    bootstrap(&ctx)?;
    dispatch(&ctx.host.commands, argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_core::command::CommandOptions;
    use parking_lot::Mutex;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_globals_are_picked_anywhere() {
        let globals =
            GlobalArgs::from_argv(&argv(&["orbit", "build", "--cwd", "/tmp/app", "--clean", "-d"]))
                .unwrap();
        assert_eq!(globals.cwd, Some(PathBuf::from("/tmp/app")));
        assert!(globals.debug);

        let globals = GlobalArgs::from_argv(&argv(&["orbit", "--pm=yarn", "info"])).unwrap();
        assert_eq!(globals.pm, "yarn");
        assert!(!globals.debug);
    }

    #[test]
    fn test_unknown_package_manager_falls_back_to_npm() {
        let globals = GlobalArgs::from_argv(&argv(&["orbit", "--pm", "pnpm", "--cwd", "/x"])).unwrap();
        let options = globals.cli_options().unwrap();
        assert_eq!(options.package_manager, PackageManager::Npm);
        assert_eq!(options.cwd, PathBuf::from("/x"));
    }

    fn surface_with_build(seen: Arc<Mutex<Option<CommandArgs>>>) -> Arc<CommandSurface> {
        let surface = CommandSurface::new();
        let _ = surface
            .command("@orbit/cli:build", "build [src] [dest]", CommandOptions::default())
            .description("Build")
            .option("--clean", "Clean")
            .option_with_default("-d, --dest <dir>", "Destination", "build")
            .option("--no-prerender", "Skip prerendering")
            .option_with_default("--hook [hook]", "Hook", "install")
            .option("-f, --feature <plugin>", "Feature")
            .action(move |args| {
                *seen.lock() = Some(args);
                Ok(())
            });
        surface
    }

    #[test]
    fn test_dispatch_converts_matches() {
        let seen = Arc::new(Mutex::new(None));
        let surface = surface_with_build(seen.clone());

        dispatch(
            &surface,
            &argv(&[
                "orbit", "build", "app", "--clean", "--no-prerender", "-f", "sass", "-f", "less",
                "--hook",
            ]),
        )
        .unwrap();

        let args = seen.lock().take().unwrap();
        assert_eq!(args.arg("src"), Some("app"));
        assert_eq!(args.arg("dest"), None);
        assert!(args.flag("clean"));
        assert!(!args.flag("prerender"));
        assert_eq!(args.value("dest"), Some("build"));
        assert_eq!(args.values("feature"), vec!["sass", "less"]);
        assert_eq!(args.value("hook"), Some("install"));
    }

    #[test]
    fn test_negated_flags_default_to_true() {
        let seen = Arc::new(Mutex::new(None));
        let surface = surface_with_build(seen.clone());
        dispatch(&surface, &argv(&["orbit", "build"])).unwrap();

        let args = seen.lock().take().unwrap();
        assert!(args.flag("prerender"));
        assert!(!args.flag("clean"));
    }

    #[test]
    fn test_reserved_short_flags_are_dropped() {
        let surface = surface_with_build(Arc::new(Mutex::new(None)));
        let spec = surface.get("build").unwrap();
        let dest = usable_options(&spec)
            .into_iter()
            .find(|o| o.key == "dest")
            .unwrap();
        assert_eq!(dest.short, None);
        build_cli(&surface).debug_assert();
    }

    #[test]
    fn test_parse_failures_are_returned() {
        let surface = surface_with_build(Arc::new(Mutex::new(None)));

        let err = dispatch(&surface, &argv(&["orbit", "deploy"])).unwrap_err();
        let clap_err = err.downcast_ref::<clap::Error>().unwrap();
        assert_eq!(clap_err.kind(), clap::error::ErrorKind::InvalidSubcommand);

        let err = dispatch(&surface, &argv(&["orbit", "--help"])).unwrap_err();
        let clap_err = err.downcast_ref::<clap::Error>().unwrap();
        assert_eq!(clap_err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_clashing_options_are_ignored() {
        let surface = CommandSurface::new();
        let _ = surface
            .command("p", "lint", CommandOptions::default())
            .option("--debug", "Clashes with the global flag")
            .option("--fix", "Fix")
            .option("--no-fix", "Clashes with --fix")
            .action(|_| Ok(()));

        let spec = surface.get("lint").unwrap();
        let keys: Vec<String> = usable_options(&spec).into_iter().map(|o| o.key).collect();
        assert_eq!(keys, vec!["fix"]);
        build_cli(&surface).debug_assert();
    }
}
