//! ## dpi-cli
//! **Command-line front end for the slot pool and reference pipeline**
//!
//! - `run`: synthetic capture → inspect pipeline, report as YAML
//! - `stress`: randomized acquire/release churn with invariant checks
//! - `config`: print the effective configuration

use clap::Parser;

mod commands;

use commands::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::run_command(cli)
}
