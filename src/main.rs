//! # Asset Shelf CLI
//!
//! This is the binary entry point for the `asset-shelf` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Turning errors into user-facing output and an exit code: `1` for a
//!   failure that left every file as it was, `3` when a write was only
//!   partially applied and files need inspection.
//!
//! The core logic lives in the `asset_shelf` library crate; the binary is a
//! thin wrapper around it.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

use asset_shelf::output::{marker, Status};

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    let output = cli.output();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:?}", marker(&output, Status::Failed), e);
            ExitCode::from(commands::exit_code(&e))
        }
    }
}
