/// CLI argument parsing, command handling and the interactive console - Gateway
mod args;
mod commands;
mod console;

pub use args::{Cli, Commands};
pub use commands::{handle_command, list_models, show_version};
pub use console::Console;
