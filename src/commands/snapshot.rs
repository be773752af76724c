//! # Snapshot Command Implementation
//!
//! Writes a snapshot pinning every repository of the working directory.
//!
//! With `--recursive N` the workspace is assembled for up to `N` rounds first:
//! dependencies declared by the checked out repositories are cloned and the
//! snapshot is retaken until it stops changing. A missing workspace config is
//! created from the manifests and repositories found in the working directory,
//! and is updated after every round. The snapshot file is rewritten
//! after every round, so it always holds the latest pinning.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;

use edm::assemble::{AssembleOptions, Assembler};
use edm::config::{read_config, write_config};
use edm::defaults::{DEFAULT_SNAPSHOT_FILE, WORKSPACE_CONFIG_FILE};
use edm::manifest::{
    add_workspace_repos, config_from_dependencies, scan_dependencies, RemoteFilter,
    DEFAULT_INCLUDE_REMOTES,
};
use edm::repository::DefaultGitOperations;

use super::Context;

/// Write a snapshot of the working directory
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Snapshot file to write
    #[arg(value_name = "FILE", default_value = DEFAULT_SNAPSHOT_FILE)]
    pub file: PathBuf,

    /// Assemble for up to N rounds until the snapshot stops changing
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub recursive: usize,

    /// Config to start from and update instead of the workspace config
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also read dependencies.yaml files below _deps directories
    #[arg(long)]
    pub include_deps: bool,

    /// Accept dependencies from any remote
    #[arg(long)]
    pub external_in_config: bool,

    /// Remote URL patterns that discovered dependencies may use
    #[arg(long, value_name = "PATTERN", num_args = 1.., default_values_t = DEFAULT_INCLUDE_REMOTES.map(String::from))]
    pub include_remotes: Vec<String>,
}

pub fn execute(args: SnapshotArgs, ctx: &Context) -> Result<()> {
    let git = DefaultGitOperations;
    let filter = RemoteFilter::new(&args.include_remotes, args.external_in_config)?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| ctx.working_dir.join(WORKSPACE_CONFIG_FILE));
    let config = if config_path.exists() {
        read_config(&config_path)?
    } else {
        info!(
            "Workspace config does not exist, creating a new one at: {}",
            config_path.display()
        );
        let scan = scan_dependencies(&ctx.working_dir, args.include_deps, &HashSet::new());
        let config = config_from_dependencies(&scan.dependencies, &filter);
        let config = add_workspace_repos(&ctx.working_dir, config, &filter, &git)?;
        write_config(&config, &config_path, false)?;
        config
    };
    let options = AssembleOptions {
        include_deps: args.include_deps,
        filter,
        materialize_initial: false,
        config_path: Some(config_path),
        ..AssembleOptions::default()
    };

    let file = args.file;
    let assembly = Assembler::new(&git, &ctx.working_dir, config, options).run(
        args.recursive.max(1),
        |round, snapshot| {
            info!("Writing snapshot of round {}", round + 1);
            write_config(snapshot, &file, true)
        },
    )?;
    if let Some(round) = assembly.converged_at {
        info!("Snapshot is stable since round {}.", round);
    }
    info!("Successfully saved snapshot \"{}\".", file.display());
    Ok(())
}
