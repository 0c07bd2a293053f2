use std::sync::{Arc, Weak};

use anyhow::Result;
use console::style;
use tracing::debug;

use orbit_core::command::CommandArgs;
use orbit_core::plugin::discovery::plugin_name_candidates;
use orbit_core::plugin::{PluginHandle, hooks};
use orbit_core::status::StatusReporter;

use crate::context::CliContext;
use crate::utils::merge_dependencies;

pub const ID: &str = "@orbit/cli:add";

pub(super) fn register(handle: &PluginHandle, ctx: Weak<CliContext>) {
    let status = Arc::clone(handle.status());
    let _ = handle
        .register_command("add <plugin>")
        .description("Add an orbit CLI plugin to the project")
        .action(move |args| {
            let ctx = super::upgrade(&ctx)?;
            add_command(&ctx, &status, &args)
        });
}

pub fn add_command(ctx: &CliContext, status: &StatusReporter, args: &CommandArgs) -> Result<()> {
    let plugin = args
        .arg("plugin")
        .ok_or_else(|| anyhow::anyhow!("missing required argument 'plugin'"))?;
    let cwd = ctx.cwd();
    let pm = ctx.options.package_manager;

    status.progress("Resolving and installing dependencies");
    let installed = plugin_name_candidates(plugin).into_iter().find(|name| {
        match pm.run_add(true, Some(cwd), &[name.as_str()]) {
            Ok(_) => true,
            Err(err) => {
                debug!("Installing {} failed: {}", name, err);
                false
            }
        }
    });
    let Some(name) = installed else {
        return Err(super::fatal(
            status,
            format!("Cannot find plugin {}", style(plugin).magenta()),
        ));
    };

    ctx.cache.invalidate();
    let registry = ctx.registry();
    let options = ctx.hook_options();
    match registry.invoke_single(&name, hooks::INSTALL, &options) {
        Ok(Some(dependencies)) => {
            if merge_dependencies(cwd, [dependencies])? {
                status.progress("Installing plugin's additional dependencies...");
                pm.run_install(Some(cwd))?;
            }
        }
        Ok(None) => {}
        Err(err) => {
            return Err(super::fatal(
                status,
                format!("Package {} could not be loaded: {err}", style(&name).magenta()),
            ));
        }
    }

    status.done();
    status.success(&format!("Added {}", style(&name).magenta()));
    Ok(())
}
