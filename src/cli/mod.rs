//! Command line interface for scriptapk.
//!
//! Argument parsing, command dispatch and colored user feedback. The heavy
//! lifting is done by [`crate::pipeline`]; commands only translate flags into
//! configuration and report results.

mod args;
pub mod commands;
mod output;

pub use args::{Args, BuildArgs, Command, RuntimeConfig};
pub use commands::execute_command;
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args).await
}
