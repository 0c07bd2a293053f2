use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use orbit_core::bundler::BundleReport;
use orbit_core::plugin::PluginRegistry;
use orbit_core::status::StatusReporter;
use orbit_core::{BuildConfig, HookOptions};

use crate::context::CliContext;
use crate::plugins::project_config;

/// Hook invocation, configuration merge and bundler hand-off shared by
/// `build` and `watch`.
///
/// Plugin chains are merged first, in registry order; the project's
/// `orbit.config.json` is applied last.
pub struct BuildPipeline<'a> {
    ctx: &'a CliContext,
    plugins: Arc<PluginRegistry>,
    project: PluginRegistry,
    options: HookOptions,
}

impl<'a> BuildPipeline<'a> {
    /// Runs `hook` on every plugin so they register their chains.
    pub fn prepare(ctx: &'a CliContext, hook: &str, options: HookOptions) -> Result<Self> {
        let plugins = ctx.registry();
        debug!("Preparing {} with plugins {:?}", hook, plugins.ids());
        plugins.invoke(hook, &options);

        let mut project = PluginRegistry::new(ctx.host.clone());
        let handle = ctx
            .host
            .handle(project_config::ID, options.cwd(), options.cwd());
        project.add_preloaded(handle, project_config::module())?;
        project.invoke(hook, &options);

        Ok(Self {
            ctx,
            plugins,
            project,
            options,
        })
    }

    pub fn options(&self) -> &HookOptions {
        &self.options
    }

    /// Folds every chain into a fresh base configuration.
    pub fn configuration(&self) -> orbit_core::Result<BuildConfig> {
        let config = self
            .plugins
            .merge_configuration(BuildConfig::base(&self.options))?;
        self.project.merge_configuration(config)
    }

    /// Merges and bundles. A merge failure is fatal.
    pub fn bundle(&self, status: &StatusReporter) -> Result<BundleReport> {
        status.progress("Merging configuration");
        let config = match self.configuration() {
            Ok(config) => config,
            Err(err) => {
                return Err(super::fatal(
                    status,
                    format!("Failed to merge configuration: {err}"),
                ));
            }
        };
        self.hand_off(&config, status)
    }

    /// Like [`Self::bundle`], but a merge failure is only reported.
    pub fn rebundle(&self, status: &StatusReporter) -> Option<BundleReport> {
        status.progress("Rebuilding");
        let result = self
            .configuration()
            .map_err(anyhow::Error::from)
            .and_then(|config| self.hand_off(&config, status));
        match result {
            Ok(report) => Some(report),
            Err(err) => {
                status.error(&format!("Rebuild failed: {err:#}"));
                None
            }
        }
    }

    fn hand_off(&self, config: &BuildConfig, status: &StatusReporter) -> Result<BundleReport> {
        status.progress("Bundling");
        let report = self.ctx.bundler.bundle(config, &self.options)?;
        status.done();
        for warning in &report.warnings {
            status.info(warning);
        }
        Ok(report)
    }
}
