//! Command line interface

pub mod args;
pub mod commands;
pub mod errors;

pub use args::{Cli, Command, ScheduleAction};
pub use commands::{execute, run, run_command};
pub use errors::{CliError, CliResult};
