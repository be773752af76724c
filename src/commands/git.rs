//! # Git Command Implementation
//!
//! `edm git info [REPO...]` reports the git state of the repositories in the
//! working directory; `edm git pull [REPO...]` pulls them. Without names every
//! first-level repository is used.

use anyhow::Result;
use clap::{Args, Subcommand};

use edm::report::{collect, format_pull_report, format_report, pull_all};
use edm::repository::DefaultGitOperations;

use super::{print_lines, Context};

/// Inspect or update the repositories of the working directory
#[derive(Args, Debug)]
pub struct GitArgs {
    #[command(subcommand)]
    pub command: GitCommands,
}

#[derive(Subcommand, Debug)]
pub enum GitCommands {
    /// Show tag, branch, upstream and dirty state of each repository
    Info {
        /// Restrict the report to these repositories
        #[arg(value_name = "REPO")]
        repos: Vec<String>,

        /// Run git fetch first
        #[arg(long)]
        fetch: bool,
    },
    /// Pull each repository
    Pull {
        /// Restrict the pull to these repositories
        #[arg(value_name = "REPO")]
        repos: Vec<String>,
    },
}

pub fn execute(args: GitArgs, ctx: &Context) -> Result<()> {
    let git = DefaultGitOperations;
    let lines = match args.command {
        GitCommands::Info { repos, fetch } => {
            let reports = collect(&git, &ctx.working_dir, &repos, fetch)?;
            format_report(&reports, &ctx.output)
        }
        GitCommands::Pull { repos } => {
            let reports = pull_all(&git, &ctx.working_dir, &repos)?;
            format_pull_report(&reports, &ctx.output)
        }
    };
    print_lines(&lines);
    Ok(())
}
