use std::env;
use std::sync::{Arc, Weak};

use anyhow::Result;
use console::style;

use orbit_core::command::CommandArgs;
use orbit_core::package_manager::{PackageManager, exec};
use orbit_core::plugin::PluginHandle;
use orbit_core::status::StatusReporter;

use crate::context::CliContext;

pub const ID: &str = "@orbit/cli:info";

pub(super) fn register(handle: &PluginHandle, ctx: Weak<CliContext>) {
    let status = Arc::clone(handle.status());
    let _ = handle
        .register_command("info")
        .description("Outputs information about your system. Used to troubleshoot issues.")
        .action(move |args| {
            let ctx = super::upgrade(&ctx)?;
            info_command(&ctx, &status, &args)
        });
}

pub fn info_command(ctx: &CliContext, status: &StatusReporter, _args: &CommandArgs) -> Result<()> {
    for line in environment_lines(ctx) {
        status.info(&line);
    }
    Ok(())
}

fn environment_lines(ctx: &CliContext) -> Vec<String> {
    let mut lines = vec![
        format!("{}:", style("Environment information").magenta()),
        "  System:".to_string(),
        format!("    OS: {} {}", env::consts::OS, env::consts::FAMILY),
        format!("    CPU: {}", env::consts::ARCH),
        "  Binaries:".to_string(),
        binary_line("Node", "node"),
    ];
    for pm in [PackageManager::Npm, PackageManager::Yarn] {
        let version = pm.version().unwrap_or_else(|_| "Not Found".to_string());
        lines.push(format!("    {}: {}", pm.name(), version));
    }
    lines.push(binary_line("Git", "git"));

    lines.push("  orbit:".to_string());
    lines.push(format!("    Version: {}", ctx.options.version));
    lines.push(format!(
        "    Package manager: {}",
        ctx.options.package_manager
    ));
    lines.push(format!("    Working directory: {}", ctx.cwd().display()));

    let plugins = ctx.registry().ids();
    if plugins.is_empty() {
        lines.push("    Plugins: none".to_string());
    } else {
        lines.push("    Plugins:".to_string());
        lines.extend(plugins.into_iter().map(|id| format!("      {id}")));
    }
    lines
}

fn binary_line(label: &str, binary: &str) -> String {
    let Ok(path) = which::which(binary) else {
        return format!("    {label}: Not Found");
    };
    let version = exec(&format!("{binary} --version"), None)
        .map(|out| out.stdout.lines().next().unwrap_or_default().to_string())
        .unwrap_or_default();
    format!("    {label}: {version} - {}", path.display())
}
