//! Command registration surface shared by all plugins

pub mod args;
pub mod signature;
pub mod surface;

pub use args::CommandArgs;
pub use signature::{ArgSpec, CommandSignature, OptionSpec, OptionValue};
pub use surface::{CommandAction, CommandBuilder, CommandOptions, CommandSpec, CommandSurface};
