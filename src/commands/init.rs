//! # Init Command Implementation
//!
//! Bootstraps a workspace:
//!
//! 1. Check that the requested release exists as a tag or branch of
//!    `everest-core`. Nothing is created on disk before this check passes.
//! 2. Clone the seed repositories. `everest-core` takes the release, the
//!    others their newest release tag (or `main`).
//! 3. Assemble the workspace until its snapshot stops changing.
//! 4. Register the workspace as the active one in the user-global registry.
//!
//! When an SSH key is registered with GitHub, seeds are cloned over SSH and
//! discovered HTTPS GitHub URLs are switched to SSH as well.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use log::info;

use edm::assemble::{AssembleOptions, Assembler, DEFAULT_MAX_ITERATIONS};
use edm::config::EdmConfig;
use edm::defaults::{
    default_edm_config_path, seed_url, GITHUB_HTTPS_PREFIX, GITHUB_SSH_PREFIX, PRIMARY_SEED,
    SEED_REPOSITORIES, WORKSPACE_CONFIG_FILE,
};
use edm::error::Error;
use edm::git::{has_github_ssh_key, latest_release};
use edm::manifest::{Dependencies, RemoteFilter};
use edm::modify::UrlRewrite;
use edm::report::{collect, format_report};
use edm::repository::{DefaultGitOperations, GitOperations};
use edm::workspace::{checkout_dependency, CheckoutRefs};

use super::{print_lines, Context};
use crate::commands::generate::setup_from_config;

/// Create a workspace from the EVerest seed repositories
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Release tag or branch of everest-core; defaults to the newest release
    #[arg(value_name = "RELEASE")]
    pub release: Option<String>,

    /// List the available everest-core releases and exit
    #[arg(long)]
    pub list: bool,

    /// Set the workspace up from this config instead of the seed repositories
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// URL prefix of the seed repositories
    #[arg(long, value_name = "URL")]
    pub remote_base: Option<String>,

    /// Keep dependencies from any remote in the workspace config
    #[arg(long)]
    pub external_in_config: bool,

    /// Upper bound on assembly rounds
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,
}

pub fn execute(args: InitArgs, ctx: &Context) -> Result<()> {
    let git = DefaultGitOperations;
    let workspace = ctx.workspace_or_working_dir();

    if let Some(config) = &args.config {
        setup_from_config(&git, config, &workspace, false)?;
        return register(&workspace);
    }

    let ssh = args.remote_base.is_none() && has_github_ssh_key();
    let prefix = match &args.remote_base {
        Some(base) => base.clone(),
        None if ssh => GITHUB_SSH_PREFIX.to_string(),
        None => GITHUB_HTTPS_PREFIX.to_string(),
    };
    let primary_url = seed_url(&prefix, PRIMARY_SEED);

    if args.list {
        info!("Available {} releases:", PRIMARY_SEED);
        for tag in git.remote_tags(&primary_url) {
            println!("{}", tag);
        }
        return Ok(());
    }

    let release = select_release(&git, &primary_url, args.release.as_deref())?;
    info!("Using {} @ {}", PRIMARY_SEED, release);

    fs::create_dir_all(&workspace)?;
    for seed in SEED_REPOSITORIES {
        let url = seed_url(&prefix, seed);
        let tag = if seed == PRIMARY_SEED {
            release.clone()
        } else {
            latest_release(&git.remote_tags(&url))
                .cloned()
                .unwrap_or_else(|| "main".to_string())
        };
        checkout_dependency(
            &git,
            seed,
            Some(&url),
            CheckoutRefs {
                tag: Some(tag),
                rev: None,
            },
            &workspace.join(seed),
            false,
        )?;
    }

    let filter = if args.external_in_config {
        RemoteFilter::allow_all()
    } else {
        RemoteFilter::default()
    };
    let options = AssembleOptions {
        filter,
        preferred_transport: ssh.then(|| UrlRewrite {
            prefix: GITHUB_HTTPS_PREFIX.to_string(),
            replace: GITHUB_SSH_PREFIX.to_string(),
        }),
        config_path: Some(workspace.join(WORKSPACE_CONFIG_FILE)),
        ..AssembleOptions::default()
    };
    let assembly = Assembler::new(&git, &workspace, Dependencies::new(), options)
        .run(args.max_iterations, |_, _| Ok(()))?;
    match assembly.converged_at {
        Some(round) => info!("Workspace is complete after {} rounds.", round + 1),
        None => info!(
            "Workspace did not settle within {} rounds.",
            assembly.iterations
        ),
    }

    let reports = collect(&git, &workspace, &[], false)?;
    print_lines(&format_report(&reports, &ctx.output));

    register(&workspace)
}

/// Returns the release to check out, failing if the remote has no such tag or
/// branch. Without a request the newest release tag is used, else `main`.
fn select_release(
    git: &dyn GitOperations,
    primary_url: &str,
    requested: Option<&str>,
) -> edm::error::Result<String> {
    let tags = git.remote_tags(primary_url);
    let Some(release) = requested else {
        return Ok(latest_release(&tags)
            .cloned()
            .unwrap_or_else(|| "main".to_string()));
    };
    if tags.iter().any(|t| t == release) {
        return Ok(release.to_string());
    }
    if git.remote_branches(primary_url).iter().any(|b| b == release) {
        info!("{} is a branch of {}", release, PRIMARY_SEED);
        return Ok(release.to_string());
    }
    Err(Error::ReleaseNotAvailable {
        release: release.to_string(),
        url: primary_url.to_string(),
    })
}

fn register(workspace: &Path) -> Result<()> {
    let path = fs::canonicalize(workspace)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let config_path = default_edm_config_path();
    let mut config = EdmConfig::load(&config_path)?.unwrap_or_default();
    config.register(&name, &path);
    config.save(&config_path)?;
    info!("Workspace \"{}\" is now active.", name);
    Ok(())
}
