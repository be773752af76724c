//! # List Command Implementation
//!
//! Prints the workspaces of the user-global registry, marking the active one.

use anyhow::Result;
use clap::Args;

use edm::config::EdmConfig;
use edm::defaults::default_edm_config_path;

use super::Context;

/// List the registered workspaces
#[derive(Args, Debug)]
pub struct ListArgs {}

pub fn execute(_args: ListArgs, ctx: &Context) -> Result<()> {
    let config_path = default_edm_config_path();
    let Some(config) = EdmConfig::load(&config_path)? else {
        println!("No workspaces registered yet.");
        return Ok(());
    };
    if config.workspaces.is_empty() {
        println!("No workspaces registered yet.");
        return Ok(());
    }

    let active = config.active().map(|(name, _)| name);
    for (name, entry) in &config.workspaces {
        let line = format!("{}: {}", name, entry.path.display());
        if active == Some(name.as_str()) {
            println!("* {}", ctx.output.green(line));
        } else {
            println!("  {}", line);
        }
    }
    Ok(())
}
