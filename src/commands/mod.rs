//! # CLI Command Implementations
//!
//! One module per subcommand, plus `generate` for the flag-driven default path
//! that runs when no subcommand is given.
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the shared
//!   [`Context`] and calls into the `edm` library.

use std::path::PathBuf;

use edm::output::OutputConfig;
use edm::settings::Settings;

pub mod completions;
pub mod generate;
pub mod git;
pub mod init;
pub mod list;
pub mod release;
pub mod rm;
pub mod snapshot;

/// Values derived from the global flags and the environment.
#[derive(Debug, Clone)]
pub struct Context {
    pub working_dir: PathBuf,
    pub workspace: Option<PathBuf>,
    pub settings: Settings,
    pub output: OutputConfig,
}

impl Context {
    /// The workspace directory: `--workspace`, else the working directory.
    pub fn workspace_or_working_dir(&self) -> PathBuf {
        self.workspace
            .clone()
            .unwrap_or_else(|| self.working_dir.clone())
    }
}

/// Prints report lines to stdout.
pub(crate) fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}
