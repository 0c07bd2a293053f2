pub mod cli;
pub mod commands;
pub mod context;
pub mod display;
pub mod plugins;
pub mod utils;

// Re-export commonly used items
pub use cli::{GlobalArgs, bootstrap, build_cli, dispatch, run};
pub use context::CliContext;
pub use display::TerminalSink;
