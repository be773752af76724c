//! # edm CLI
//!
//! Binary entry point for the `edm` command-line tool.
//!
//! It parses the command line with `clap`, sets up logging and hands over to
//! the matching command. Everything else lives in the `edm` library crate.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
