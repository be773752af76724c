//! Process-wide overrides read from the environment once at start-up.

use std::env;
use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "EVEREST_EDM_WORKSPACE";
pub const ENV_MODIFY_DEPENDENCIES: &str = "EVEREST_MODIFY_DEPENDENCIES";
pub const ENV_MODIFY_DEPENDENCIES_URLS: &str = "EVEREST_MODIFY_DEPENDENCIES_URLS";
pub const ENV_UPDATE_CHANNEL: &str = "EVEREST_UPDATE_CHANNEL";
pub const ENV_METADATA_FILE: &str = "EVEREST_METADATA_FILE";
pub const ENV_METADATA_INCLUDE_ALL: &str = "EVEREST_METADATA_INCLUDE_ALL";

/// Channel label used when none is configured.
pub const DEFAULT_UPDATE_CHANNEL: &str = "unknown";

/// Environment overrides. Empty variables count as unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Workspace directory for the CMake path.
    pub workspace: Option<PathBuf>,
    /// File of structural dependency modifications.
    pub modify_dependencies: Option<PathBuf>,
    /// URL rewrite directives.
    pub modify_dependencies_urls: Option<String>,
    /// Release channel label.
    pub update_channel: String,
    /// Metadata file for release manifests.
    pub metadata_file: Option<PathBuf>,
    /// Add every metadata entry to release manifests, not only the built ones.
    pub metadata_include_all: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace: None,
            modify_dependencies: None,
            modify_dependencies_urls: None,
            update_channel: DEFAULT_UPDATE_CHANNEL.to_string(),
            metadata_file: None,
            metadata_include_all: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Self {
            workspace: get(ENV_WORKSPACE).map(PathBuf::from),
            modify_dependencies: get(ENV_MODIFY_DEPENDENCIES).map(PathBuf::from),
            modify_dependencies_urls: get(ENV_MODIFY_DEPENDENCIES_URLS),
            update_channel: get(ENV_UPDATE_CHANNEL)
                .unwrap_or_else(|| DEFAULT_UPDATE_CHANNEL.to_string()),
            metadata_file: get(ENV_METADATA_FILE).map(PathBuf::from),
            metadata_include_all: get(ENV_METADATA_INCLUDE_ALL).as_deref() == Some("yes"),
        }
    }
}
