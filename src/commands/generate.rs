//! # Default Path
//!
//! What `edm` does without a subcommand, selected by flags and checked in
//! this order:
//!
//! 1. `--config <FILE>`: set up `--workspace` from a config.
//! 2. `--create-config <FILE>`: write a config for the working directory.
//! 3. `--create-snapshot <FILE>`: write a snapshot of the working directory.
//! 4. `--git-info`: report on the repositories of the working directory.
//! 5. `--git-pull [REPO...]`: pull them.
//! 6. `--cmake`: render the CPM dependency file.
//!
//! Without any of them the help text is printed.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::{Args, CommandFactory};
use log::info;

use edm::cmake::write_cmake;
use edm::config::{read_config, read_config_or_default, write_atomic, write_config};
use edm::defaults::{DEFAULT_CMAKE_OUT, WORKSPACE_CONFIG_FILE};
use edm::manifest::{
    add_workspace_repos, config_from_dependencies, scan_dependencies, RemoteFilter,
    DEFAULT_INCLUDE_REMOTES,
};
use edm::modify::{modify_from_file, modify_urls};
use edm::report::{collect, format_pull_report, format_report, pull_all};
use edm::repository::{DefaultGitOperations, GitOperations};
use edm::resolve::resolve_remote_refs;
use edm::snapshot::create_snapshot;
use edm::workspace::{
    checkout_local_dependencies, setup_workspace, write_vscode_workspace, WorkspaceDirectory,
};

use super::{print_lines, Context};
use crate::cli::Cli;

#[derive(Args, Debug, Default)]
pub struct GenerateArgs {
    /// Render the CPM dependency file for the working directory
    #[arg(long)]
    pub cmake: bool,

    /// Output file of --cmake
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CMAKE_OUT)]
    pub out: PathBuf,

    /// Set up --workspace from this config
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write a config describing the working directory to FILE
    #[arg(long, value_name = "FILE")]
    pub create_config: Option<PathBuf>,

    /// Write a snapshot of the working directory to FILE
    #[arg(long, value_name = "FILE")]
    pub create_snapshot: Option<PathBuf>,

    /// Show the git state of every repository in the working directory
    #[arg(long)]
    pub git_info: bool,

    /// Fetch before --git-info
    #[arg(long)]
    pub git_fetch: bool,

    /// Pull every (or every named) repository in the working directory
    #[arg(long, value_name = "REPO", num_args = 0..)]
    pub git_pull: Option<Vec<String>>,

    /// Also read dependencies.yaml files below _deps directories
    #[arg(long)]
    pub include_deps: bool,

    /// Keep dependencies from any remote in created configs
    #[arg(long)]
    pub external_in_config: bool,

    /// Remote URL patterns that created configs may contain
    #[arg(long, value_name = "PATTERN", num_args = 1.., default_values_t = DEFAULT_INCLUDE_REMOTES.map(String::from))]
    pub include_remotes: Vec<String>,

    /// With --config, also write a VS Code workspace file
    #[arg(long)]
    pub create_vscode_workspace: bool,
}

pub fn execute(args: GenerateArgs, ctx: &Context) -> Result<()> {
    let git = DefaultGitOperations;
    if let Some(config) = &args.config {
        let Some(workspace) = &ctx.workspace else {
            bail!("--config requires --workspace");
        };
        setup_from_config(&git, config, workspace, args.create_vscode_workspace)
    } else if let Some(out) = &args.create_config {
        create_config(&git, &args, &ctx.working_dir, out)
    } else if let Some(out) = &args.create_snapshot {
        let config = read_config_or_default(&ctx.working_dir.join(WORKSPACE_CONFIG_FILE))?;
        let snapshot = create_snapshot(&git, &ctx.working_dir, &config)?;
        write_config(&snapshot, out, false)?;
        Ok(())
    } else if args.git_info {
        let reports = collect(&git, &ctx.working_dir, &[], args.git_fetch)?;
        print_lines(&format_report(&reports, &ctx.output));
        Ok(())
    } else if let Some(repos) = &args.git_pull {
        let reports = pull_all(&git, &ctx.working_dir, repos)?;
        print_lines(&format_pull_report(&reports, &ctx.output));
        Ok(())
    } else if args.cmake {
        generate_cmake(&git, &args, ctx)
    } else {
        Cli::command().print_help()?;
        Ok(())
    }
}

/// Materializes `config` in `workspace` and stores a copy of the config
/// there.
pub fn setup_from_config(
    git: &dyn GitOperations,
    config_path: &Path,
    workspace: &Path,
    create_vscode_workspace: bool,
) -> Result<()> {
    let config = read_config(config_path)?;
    let checkouts = setup_workspace(git, workspace, &config)?;

    let target = workspace.join(WORKSPACE_CONFIG_FILE);
    let same_file = match (fs::canonicalize(config_path), fs::canonicalize(&target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if same_file {
        info!("Config is already the workspace config, not copying it.");
    } else {
        let content = fs::read(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        write_atomic(&target, &content)?;
        info!("Copied config to \"{}\"", target.display());
    }

    if create_vscode_workspace {
        write_vscode_workspace(workspace, &checkouts)?;
    }
    Ok(())
}

fn create_config(
    git: &dyn GitOperations,
    args: &GenerateArgs,
    working_dir: &Path,
    out: &Path,
) -> Result<()> {
    info!("Creating config file: {}", out.display());
    let filter = RemoteFilter::new(&args.include_remotes, args.external_in_config)?;
    let scan = scan_dependencies(working_dir, args.include_deps, &HashSet::new());
    let config = config_from_dependencies(&scan.dependencies, &filter);
    let config = add_workspace_repos(working_dir, config, &filter, git)?;
    write_config(&config, out, false)?;
    Ok(())
}

fn generate_cmake(git: &dyn GitOperations, args: &GenerateArgs, ctx: &Context) -> Result<()> {
    let working_dir = fs::canonicalize(&ctx.working_dir)
        .with_context(|| format!("working directory {}", ctx.working_dir.display()))?;
    let workspace_dir = cmake_workspace_dir(
        ctx.workspace.as_deref(),
        ctx.settings.workspace.as_deref(),
        &working_dir,
    );
    info!("Using workspace directory \"{}\"", workspace_dir.display());

    let mut dependencies =
        scan_dependencies(&working_dir, args.include_deps, &HashSet::new()).dependencies;

    let workspace = if workspace_dir.is_dir() {
        WorkspaceDirectory::scan(git, &workspace_dir)?
    } else {
        WorkspaceDirectory {
            workspace: workspace_dir,
            ..WorkspaceDirectory::default()
        }
    };
    let checkouts = checkout_local_dependencies(git, &workspace, &dependencies)?;

    if let Some(input) = &ctx.settings.modify_dependencies_urls {
        modify_urls(&mut dependencies, input)?;
    }
    if let Some(file) = &ctx.settings.modify_dependencies {
        modify_from_file(&mut dependencies, file);
    }

    let local: HashSet<String> = checkouts.iter().map(|c| c.name.clone()).collect();
    resolve_remote_refs(&mut dependencies, &local, git);

    write_cmake(&dependencies, &checkouts, &workspace, &args.out)?;
    Ok(())
}

/// `--workspace` wins over `EVEREST_EDM_WORKSPACE`; without either the parent
/// of the working directory is the workspace.
fn cmake_workspace_dir(flag: Option<&Path>, env: Option<&Path>, working_dir: &Path) -> PathBuf {
    flag.or(env)
        .or_else(|| working_dir.parent())
        .unwrap_or(working_dir)
        .to_path_buf()
}
