//! CLI Adapter
//!
//! Command-line interface for goldmint.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{BuyCmd, CliApp, Command, MaxCmd, PreviewCmd};

use anyhow::Result;

/// Parse the command line
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    commands::execute(app).await
}
