//! Built-in commands
//!
//! Every command is a compiled-in plugin with the id `@orbit/cli:<name>`
//! whose `cli` hook registers it on the shared command surface, exactly
//! like third-party plugins do.

pub mod add;
pub mod build;
pub mod info;
pub mod invoke;
pub mod new;
pub mod pipeline;
pub mod watch;

pub use add::add_command;
pub use build::build_command;
pub use info::info_command;
pub use invoke::invoke_command;
pub use new::new_command;
pub use pipeline::BuildPipeline;
pub use watch::watch_command;

use std::sync::{Arc, Weak};

use anyhow::{Context, Result};

use orbit_core::plugin::{PluginHandle, PluginModule, hooks};
use orbit_core::status::StatusReporter;

use crate::context::CliContext;

type Register = fn(&PluginHandle, Weak<CliContext>);

const BUILTINS: [(&str, Register); 6] = [
    (add::ID, add::register),
    (build::ID, build::register),
    (info::ID, info::register),
    (invoke::ID, invoke::register),
    (new::ID, new::register),
    (watch::ID, watch::register),
];

/// Plugin modules of the built-in commands, keyed by id
pub fn modules(ctx: &Arc<CliContext>) -> Vec<(&'static str, PluginModule)> {
    BUILTINS
        .iter()
        .map(|&(id, register)| {
            let ctx = Arc::downgrade(ctx);
            let module = PluginModule::new().with_hook(hooks::CLI, move |handle, _| {
                register(handle, ctx.clone());
                Ok(None)
            });
            (id, module)
        })
        .collect()
}

/// Command actions hold the context weakly; it owns the surface that owns them.
fn upgrade(ctx: &Weak<CliContext>) -> Result<Arc<CliContext>> {
    ctx.upgrade().context("CLI context is no longer available")
}

/// Reports a fatal status and returns the matching error.
///
/// The terminal sink exits on fatal statuses; other sinks get the error.
pub(crate) fn fatal(status: &StatusReporter, message: String) -> anyhow::Error {
    status.fatal(&message);
    anyhow::anyhow!(console::strip_ansi_codes(&message).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_core::CliOptions;
    use orbit_core::command::{CommandArgs, CommandSurface};
    use orbit_core::plugin::PluginHost;
    use orbit_core::status::{MemorySink, StatusEvent, StatusKind};
    use tempfile::TempDir;

    fn context(dir: &TempDir, sink: Arc<MemorySink>) -> Arc<CliContext> {
        let host = PluginHost::new(CommandSurface::new(), sink, Arc::new(crate::plugins::catalog()))
            .without_global_packages();
        let ctx = Arc::new(CliContext::with_host(CliOptions::new(dir.path()), host));
        crate::cli::bootstrap(&ctx).unwrap();
        ctx
    }

    #[test]
    fn test_builtin_action_runs_against_the_context() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(MemorySink::new());
        let ctx = context(&dir, sink.clone());

        ctx.host.commands.dispatch("info", CommandArgs::new()).unwrap();

        assert!(sink.events_for(info::ID).iter().any(|event| matches!(
            event,
            StatusEvent::Report { kind: StatusKind::Info, text: Some(text) }
                if text.contains("Working directory")
        )));
    }

    #[test]
    fn test_builtin_action_fails_once_the_context_is_gone() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, Arc::new(MemorySink::new()));
        let surface = Arc::clone(&ctx.host.commands);
        drop(ctx);

        let err = surface.dispatch("info", CommandArgs::new()).unwrap_err();
        assert!(err.to_string().contains("no longer available"));
    }
}
