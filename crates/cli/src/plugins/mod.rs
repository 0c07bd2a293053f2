//! Compiled-in plugins

pub mod project_config;
pub mod styles;

use orbit_core::plugin::Catalog;

/// Plugins that ship with the binary and need no `node_modules` entry
pub fn catalog() -> Catalog {
    styles::LANGUAGES
        .iter()
        .fold(Catalog::new(), |catalog, language| {
            catalog.with_module(language.package_name(), language.module())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_core::plugin::ModuleLoader;

    #[test]
    fn test_catalog_contains_style_plugins() {
        let catalog = catalog();
        assert_eq!(
            catalog.ids().collect::<Vec<_>>(),
            vec![
                "@orbit/cli-plugin-sass",
                "@orbit/cli-plugin-less",
                "@orbit/cli-plugin-stylus"
            ]
        );
        assert!(catalog.is_builtin("@orbit/cli-plugin-less"));
    }
}
