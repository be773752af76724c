//! # Configuration Files
//!
//! Reading and writing of the YAML files the tool persists:
//!
//! - **Workspace config / snapshot**: a [`Dependencies`] map, stored as
//!   `<workspace>/workspace-config.yaml` or under a caller-chosen name.
//! - **User-global registry** ([`EdmConfig`]): the list of known workspaces
//!   and which one is active, stored at `<user-config-dir>/edm/edm.yaml`:
//!
//! ```yaml
//! edm:
//!   active_workspace: everest-workspace
//! workspaces:
//!   everest-workspace:
//!     path: /home/user/checkout/everest-workspace
//! ```
//!
//! Every write goes through [`write_atomic`], so a reader never observes a
//! partially written file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::manifest::{parse_dependencies, Dependencies};

/// Replaces `path` with `contents` through a temporary file in the same
/// directory. Parent directories are created as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Reads a workspace config or snapshot. The file must exist.
pub fn read_config(path: &Path) -> Result<Dependencies> {
    if !path.is_file() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path)?;
    parse_dependencies(&content, path)
}

/// Reads a workspace config, treating a missing file as empty.
pub fn read_config_or_default(path: &Path) -> Result<Dependencies> {
    if path.is_file() {
        read_config(path)
    } else {
        Ok(Dependencies::new())
    }
}

/// Writes `config` to `path`. Unless `silent`, every entry and the final path
/// are logged.
pub fn write_config(config: &Dependencies, path: &Path, silent: bool) -> Result<()> {
    if !silent {
        for name in config.keys() {
            info!("Adding \"{}\" to config.", name);
        }
    }
    let yaml = serde_yaml::to_string(config)?;
    write_atomic(path, yaml.as_bytes())?;
    if !silent {
        info!("Successfully saved config \"{}\".", path.display());
    }
    Ok(())
}

/// The `edm` section of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdmSection {
    #[serde(default)]
    pub active_workspace: Option<String>,
}

/// A registered workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    pub path: PathBuf,
}

/// The user-global registry of workspaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdmConfig {
    #[serde(default)]
    pub edm: EdmSection,
    #[serde(default)]
    pub workspaces: BTreeMap<String, WorkspaceEntry>,
}

impl EdmConfig {
    /// Loads the registry at `path`. Returns `None` if there is none yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        debug!("Loading edm config from {}", path.display());
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Some(Self::default()));
        }
        serde_yaml::from_str(&content)
            .map(Some)
            .map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Writes the registry to `path`, creating its directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        write_atomic(path, yaml.as_bytes())?;
        info!("Successfully saved edm config \"{}\".", path.display());
        Ok(())
    }

    /// Registers `name` at `path` and makes it the active workspace.
    pub fn register(&mut self, name: &str, path: &Path) {
        self.workspaces.insert(
            name.to_string(),
            WorkspaceEntry {
                path: path.to_path_buf(),
            },
        );
        self.edm.active_workspace = Some(name.to_string());
    }

    /// Removes `name`. Returns false if it was not registered.
    ///
    /// Removing the active workspace leaves no workspace active.
    pub fn remove(&mut self, name: &str) -> bool {
        if self.workspaces.remove(name).is_none() {
            return false;
        }
        if self.edm.active_workspace.as_deref() == Some(name) {
            self.edm.active_workspace = None;
        }
        true
    }

    /// The active workspace and its entry, if any.
    pub fn active(&self) -> Option<(&str, &WorkspaceEntry)> {
        let name = self.edm.active_workspace.as_deref()?;
        self.workspaces.get(name).map(|entry| (name, entry))
    }
}
