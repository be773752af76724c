//! # Release Command Implementation
//!
//! Builds the JSON release manifest from a configured CMake build directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use edm::defaults::{DEFAULT_RELEASE_OUT, METADATA_URL};
use edm::release::{create_release, write_release};
use edm::repository::DefaultGitOperations;

use super::Context;

/// Create a release manifest from a CMake build directory
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// everest-core checkout the release is built from
    #[arg(long, value_name = "DIR")]
    pub everest_core_dir: PathBuf,

    /// CMake build directory containing CPM_modules
    #[arg(long, value_name = "DIR")]
    pub build_dir: PathBuf,

    /// Release manifest to write
    #[arg(long, value_name = "FILE", default_value = DEFAULT_RELEASE_OUT)]
    pub out: PathBuf,

    /// Where component metadata is downloaded from
    #[arg(long, value_name = "URL", default_value = METADATA_URL, hide = true)]
    pub metadata_url: String,
}

pub fn execute(args: ReleaseArgs, ctx: &Context) -> Result<()> {
    let manifest = create_release(
        &DefaultGitOperations,
        &args.everest_core_dir,
        &args.build_dir,
        &ctx.settings,
        &args.metadata_url,
    )?;
    write_release(&manifest, &args.out)?;
    Ok(())
}
