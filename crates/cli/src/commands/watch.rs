use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, new_debouncer};
use tracing::{debug, warn};

use orbit_core::command::CommandArgs;
use orbit_core::config::PROJECT_CONFIG_FILE;
use orbit_core::plugin::{PluginHandle, hooks};
use orbit_core::status::StatusReporter;

use super::pipeline::BuildPipeline;
use crate::context::CliContext;

pub const ID: &str = "@orbit/cli:watch";

const DEBOUNCE: Duration = Duration::from_millis(200);

pub(super) fn register(handle: &PluginHandle, ctx: Weak<CliContext>) {
    let status = Arc::clone(handle.status());
    let _ = handle
        .register_command("watch [src]")
        .description("Start a development build and rebuild on changes")
        .option_with_default("-p, --port <port>", "Port of the development server", "8080")
        .action(move |args| {
            let ctx = super::upgrade(&ctx)?;
            watch_command(&ctx, &status, &args)
        });
}

pub fn watch_command(ctx: &CliContext, status: &StatusReporter, args: &CommandArgs) -> Result<()> {
    let port: u16 = args
        .value("port")
        .unwrap_or("8080")
        .parse()
        .context("--port must be a number between 0 and 65535")?;

    let mut options = ctx
        .hook_options()
        .with_watch(true)
        .with_extra("port", port);
    if let Some(src) = args.arg("src") {
        options = options.with_src(ctx.cwd().join(src));
    }

    status.progress("Running watch hooks");
    let pipeline = BuildPipeline::prepare(ctx, hooks::WATCH, options)?;
    pipeline.bundle(status)?;
    status.success(&format!(
        "Development build ready on port {}",
        style(port).magenta()
    ));

    watch_loop(&pipeline, status)
}

/// Rebuilds on every debounced batch of relevant changes until the watcher
/// goes away.
fn watch_loop(pipeline: &BuildPipeline<'_>, status: &StatusReporter) -> Result<()> {
    let options = pipeline.options();
    let (tx, rx) = mpsc::channel();
    let mut debouncer = new_debouncer(DEBOUNCE, tx).context("Failed to create file watcher")?;

    debouncer
        .watcher()
        .watch(&options.src, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", options.src.display()))?;
    let project_config = options.cwd().join(PROJECT_CONFIG_FILE);
    if project_config.is_file() {
        debouncer
            .watcher()
            .watch(&project_config, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", project_config.display()))?;
    }

    status.info(&format!(
        "Watching {} for changes",
        style(options.src.display()).magenta()
    ));

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed = relevant_events(&events, &options.dest);
                if changed == 0 {
                    continue;
                }
                debug!("Detected {} change(s)", changed);
                if pipeline.rebundle(status).is_some() {
                    status.success(&format!("Rebuilt after {changed} change(s)"));
                }
            }
            Ok(Err(error)) => {
                warn!("Watch error: {:?}", error);
            }
            Err(err) => {
                debug!("Watcher channel closed: {}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Events outside the output directory
fn relevant_events(events: &[DebouncedEvent], dest: &Path) -> usize {
    events
        .iter()
        .filter(|event| !event.path.starts_with(dest))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_debouncer_mini::DebouncedEventKind;
    use std::path::PathBuf;

    fn event(path: &str) -> DebouncedEvent {
        DebouncedEvent {
            path: PathBuf::from(path),
            kind: DebouncedEventKind::Any,
        }
    }

    #[test]
    fn test_output_changes_are_ignored() {
        let events = vec![
            event("/app/src/index.js"),
            event("/app/src/build/bundle.js"),
            event("/app/src/style/index.css"),
        ];
        assert_eq!(relevant_events(&events, Path::new("/app/src/build")), 2);
    }
}
