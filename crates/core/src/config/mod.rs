//! Build configuration value, deep merging and the project config file

pub mod build;
pub mod merge;
pub mod project;

pub use build::{BuildConfig, RuleBuilder};
pub use merge::{deep_merge, merge_replacing_arrays};
pub use project::{PROJECT_CONFIG_FILE, ProjectConfig};
