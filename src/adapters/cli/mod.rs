//! CLI Adapter
//!
//! Command-line interface for the token feed.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CacheAction, CacheCmd, CliApp, Command, FetchCmd, HoldersCmd, RunCmd};

/// Parse the command line
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}
