//! # Rm Command Implementation
//!
//! Removes a workspace from the user-global registry. The workspace
//! directory itself is left alone.

use anyhow::{bail, Result};
use clap::Args;
use log::info;

use edm::config::EdmConfig;
use edm::defaults::default_edm_config_path;

use super::Context;

/// Remove a workspace from the registry
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Name of the workspace
    #[arg(value_name = "NAME")]
    pub name: String,
}

pub fn execute(args: RmArgs, _ctx: &Context) -> Result<()> {
    let config_path = default_edm_config_path();
    let Some(mut config) = EdmConfig::load(&config_path)? else {
        bail!("no workspace registry found at {}", config_path.display());
    };
    if !config.remove(&args.name) {
        bail!("workspace \"{}\" is not registered", args.name);
    }
    config.save(&config_path)?;
    info!("Removed workspace \"{}\" from the registry.", args.name);
    Ok(())
}
