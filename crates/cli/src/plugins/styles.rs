//! Stylesheet preprocessor plugins
//!
//! Each language is published as `@orbit/cli-plugin-<name>` and chains one
//! module rule on `build` and `watch`. They only take effect when the
//! project declares the package.

use serde_json::{Value, json};

use orbit_core::plugin::{PluginHandle, PluginModule, hooks};
use orbit_core::HookOptions;

/// A stylesheet language and the loader that compiles it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleLanguage {
    /// Rule name and package suffix
    pub name: &'static str,
    pub test: &'static str,
    pub loader: &'static str,
    /// Compiler package the loader needs next to it
    pub compiler: &'static str,
    /// Loader option enabling source maps
    pub source_map_key: &'static str,
    pub enforce_pre: bool,
}

pub const SASS: StyleLanguage = StyleLanguage {
    name: "sass",
    test: r"\.s[ac]ss$",
    loader: "sass-loader",
    compiler: "sass",
    source_map_key: "sourceMap",
    enforce_pre: true,
};

pub const LESS: StyleLanguage = StyleLanguage {
    name: "less",
    test: r"\.less$",
    loader: "less-loader",
    compiler: "less",
    source_map_key: "sourceMap",
    enforce_pre: true,
};

pub const STYLUS: StyleLanguage = StyleLanguage {
    name: "stylus",
    test: r"\.styl$",
    loader: "stylus-loader",
    compiler: "stylus",
    source_map_key: "sourceMaps",
    enforce_pre: false,
};

pub const LANGUAGES: [StyleLanguage; 3] = [SASS, LESS, STYLUS];

impl StyleLanguage {
    pub fn package_name(&self) -> String {
        format!("@orbit/cli-plugin-{}", self.name)
    }

    pub fn module(self) -> PluginModule {
        PluginModule::new()
            .with_hook(hooks::BUILD, move |handle, options| {
                self.chain_rule(handle, options);
                Ok(None)
            })
            .with_hook(hooks::WATCH, move |handle, options| {
                self.chain_rule(handle, options);
                Ok(None)
            })
            .with_hook(hooks::INSTALL, move |_, _| Ok(Some(self.dependencies())))
    }

    fn chain_rule(self, handle: &PluginHandle, options: &HookOptions) {
        let source_maps = !options.production;
        handle.chain_configuration(move |config| {
            let rule = config.rule(self.name).test(self.test).loader(self.loader);
            let rule = if self.enforce_pre { rule.enforce("pre") } else { rule };
            rule.options(json!({ self.source_map_key: source_maps }));
            Ok(None)
        });
    }

    /// Packages added to the project by the `install` hook
    pub fn dependencies(&self) -> Value {
        json!({
            "devDependencies": {
                self.loader: "latest",
                self.compiler: "latest",
            }
        })
    }
}
