//! # Completions Command Implementation
//!
//! Prints a completion script for `edm` that covers the default-path flags
//! (`--cmake`, `--git-info`, `--create-snapshot`, ...) as well as the
//! workspace subcommands.
//!
//! ```bash
//! edm completions bash > ~/.local/share/bash-completion/completions/edm
//! edm completions fish > ~/.config/fish/completions/edm.fish
//! ```

use std::io;

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};

use crate::cli::Cli;

/// Print a shell completion script for edm
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to complete edm commands and flags in
    #[arg(value_enum, value_name = "SHELL")]
    pub shell: Shell,
}

pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(args.shell, &mut cmd, bin_name, &mut io::stdout());
    Ok(())
}
