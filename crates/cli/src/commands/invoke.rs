use std::sync::{Arc, Weak};

use anyhow::Result;

use orbit_core::command::CommandArgs;
use orbit_core::plugin::{PluginHandle, hooks};
use orbit_core::status::StatusReporter;

use crate::context::CliContext;
use crate::utils::merge_dependencies;

pub const ID: &str = "@orbit/cli:invoke";

pub(super) fn register(handle: &PluginHandle, ctx: Weak<CliContext>) {
    let status = Arc::clone(handle.status());
    let _ = handle
        .register_command("invoke [plugin]")
        .description("Invokes plugin(s) to finish installation")
        .option_with_default(
            "--hook [hook]",
            "Change hook to use (WARNING: internal)",
            hooks::INSTALL,
        )
        .action(move |args| {
            let ctx = super::upgrade(&ctx)?;
            invoke_command(&ctx, &status, &args)
        });
}

pub fn invoke_command(ctx: &CliContext, status: &StatusReporter, args: &CommandArgs) -> Result<()> {
    let hook = args.value("hook").unwrap_or(hooks::INSTALL);
    let registry = ctx.registry();
    let options = ctx.hook_options();

    let results = match args.arg("plugin") {
        Some(plugin) => vec![registry.invoke_single(plugin, hook, &options)?],
        None => registry.invoke(hook, &options),
    };

    if hook == hooks::INSTALL {
        status.progress("Installing plugin's additional dependencies...");
        merge_dependencies(ctx.cwd(), results.into_iter().flatten())?;
        ctx.options.package_manager.run_install(Some(ctx.cwd()))?;
    }

    status.done();
    status.success("Done");
    Ok(())
}
