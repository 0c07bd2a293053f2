pub mod setup;

pub use setup::{add_scripts, init_git, merge_dependencies, write_manifest};
