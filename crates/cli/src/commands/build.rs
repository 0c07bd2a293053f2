use std::fs;
use std::sync::{Arc, Weak};

use anyhow::{Context, Result};
use console::style;

use orbit_core::command::CommandArgs;
use orbit_core::plugin::{PluginHandle, hooks};
use orbit_core::status::StatusReporter;

use super::pipeline::BuildPipeline;
use crate::context::CliContext;

pub const ID: &str = "@orbit/cli:build";

pub(super) fn register(handle: &PluginHandle, ctx: Weak<CliContext>) {
    let status = Arc::clone(handle.status());
    let _ = handle
        .register_command("build [src] [dest]")
        .description("Build the current project into static files")
        .option("--clean", "Removes destination folder before building")
        .option_with_default("--dest <dir>", "Destination folder", "build")
        .option("--no-prerender", "Don't prerender URLs")
        .option("--production", "Sets the build as production build")
        .option("--brotli", "Enable Brotli compression")
        .action(move |args| {
            let ctx = super::upgrade(&ctx)?;
            build_command(&ctx, &status, &args)
        });
}

pub fn build_command(ctx: &CliContext, status: &StatusReporter, args: &CommandArgs) -> Result<()> {
    let cwd = ctx.cwd();
    let mut options = ctx
        .hook_options()
        .with_production(args.flag("production"))
        .with_extra("prerender", args.flag("prerender"))
        .with_extra("brotli", args.flag("brotli"))
        .with_extra("clean", args.flag("clean"));
    if let Some(src) = args.arg("src") {
        options = options.with_src(cwd.join(src));
    }
    if let Some(dest) = args.arg("dest").or_else(|| args.value("dest")) {
        options = options.with_dest(cwd.join(dest));
    }

    if !cwd.join("node_modules").is_dir() {
        status.error(&format!(
            "No 'node_modules' folder found! Please run {} before continuing.",
            style(options.package_manager().install_command()).magenta()
        ));
    }

    if args.flag("brotli") {
        status.info(
            "ATTENTION! You have enabled BROTLI support. In order for this to work correctly, \
             make sure .js.br files are served with 'content-encoding: br' header.",
        );
    }

    if args.flag("clean") && options.dest.exists() {
        status.progress("Removing old dest. directory");
        fs::remove_dir_all(&options.dest)
            .with_context(|| format!("Failed to remove {}", options.dest.display()))?;
    }

    status.progress("Running build hooks");
    let pipeline = BuildPipeline::prepare(ctx, hooks::BUILD, options)?;
    let report = pipeline.bundle(status)?;

    status.success(&format!(
        "Build finished in {}",
        style(pipeline.options().dest.display()).magenta()
    ));
    for output in &report.outputs {
        status.info(&format!("  {}", output.display()));
    }
    Ok(())
}
