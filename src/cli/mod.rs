mod commands;
mod handlers;

pub use commands::{Cli, Commands, ImportArgs, RangeArgs, SourceArgs};
pub use handlers::{handle_import, handle_urls};
