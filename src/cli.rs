//! CLI argument parsing and command dispatch

use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{debug, warn, LevelFilter};

use edm::output::OutputConfig;
use edm::settings::Settings;

use crate::commands::{self, Context};

/// Dependency manager for EVerest workspaces
///
/// Without a subcommand, one of the flags below selects what to do: render the
/// CMake dependency file, write a config or snapshot, set up a workspace from a
/// config, or report on the repositories of the working directory.
#[derive(Parser, Debug)]
#[command(name = "edm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    generate: commands::generate::GenerateArgs,

    /// Working directory
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    working_dir: PathBuf,

    /// Workspace directory
    #[arg(long, global = true, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Verbose output, same as --log-level debug
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Disable colored output, same as --color never
    #[arg(long, global = true)]
    nocolor: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a workspace from the EVerest seed repositories
    Init(commands::init::InitArgs),

    /// List the registered workspaces
    List(commands::list::ListArgs),

    /// Remove a workspace from the registry (nothing is deleted on disk)
    Rm(commands::rm::RmArgs),

    /// Inspect or update the repositories of the working directory
    Git(commands::git::GitArgs),

    /// Write a snapshot pinning every repository of the working directory
    Snapshot(commands::snapshot::SnapshotArgs),

    /// Create a release manifest from a CMake build directory
    Release(commands::release::ReleaseArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        self.init_logging();
        if std::env::var_os("CPM_SOURCE_CACHE").is_none() {
            warn!("CPM_SOURCE_CACHE not set. Dependencies will not be cached between builds.");
        }

        let color = if self.nocolor { "never" } else { self.color.as_str() };
        let ctx = Context {
            working_dir: self.working_dir.clone(),
            workspace: self.workspace.clone(),
            settings: Settings::from_env(),
            output: OutputConfig::from_env_and_flag(color),
        };

        match self.command {
            None => commands::generate::execute(self.generate, &ctx),
            Some(Commands::Init(args)) => commands::init::execute(args, &ctx),
            Some(Commands::List(args)) => commands::list::execute(args, &ctx),
            Some(Commands::Rm(args)) => commands::rm::execute(args, &ctx),
            Some(Commands::Git(args)) => commands::git::execute(args, &ctx),
            Some(Commands::Snapshot(args)) => commands::snapshot::execute(args, &ctx),
            Some(Commands::Release(args)) => commands::release::execute(args, &ctx),
            Some(Commands::Completions(args)) => commands::completions::execute(args),
        }
    }

    /// `--verbose` wins over `--log-level`; `RUST_LOG` wins over both.
    ///
    /// Returns false when a logger was already installed, which then keeps
    /// receiving the records.
    fn init_logging(&self) -> bool {
        let level = if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
        };
        let mut builder = env_logger::Builder::new();
        builder
            .filter_level(level)
            .format(|buf, record| writeln!(buf, "[edm]: {}", record.args()))
            .parse_default_env();
        match builder.try_init() {
            Ok(()) => true,
            Err(e) => {
                debug!("Keeping the existing logger: {}", e);
                false
            }
        }
    }
}
