//! Default values shared by the commands.

use std::path::PathBuf;

/// Config file kept inside every workspace.
pub const WORKSPACE_CONFIG_FILE: &str = "workspace-config.yaml";

/// Default name of a snapshot file.
pub const DEFAULT_SNAPSHOT_FILE: &str = "snapshot.yaml";

/// Default output of the CMake path.
pub const DEFAULT_CMAKE_OUT: &str = "dependencies.cmake";

/// Default release manifest file.
pub const DEFAULT_RELEASE_OUT: &str = "release.json";

pub const GITHUB_HTTPS_PREFIX: &str = "https://github.com/EVerest/";
pub const GITHUB_SSH_PREFIX: &str = "git@github.com:EVerest/";

/// Repository whose tags define the available releases.
pub const PRIMARY_SEED: &str = "everest-core";

/// Repositories every new workspace starts from. The primary seed comes first.
pub const SEED_REPOSITORIES: [&str; 4] = [
    PRIMARY_SEED,
    "everest-cmake",
    "everest-dev-environment",
    "everest-utils",
];

/// Component metadata used by release manifests.
pub const METADATA_URL: &str =
    "https://raw.githubusercontent.com/EVerest/everest-dev-environment/main/everest-metadata.yaml";

/// Overrides the directory of the user-global config.
pub const ENV_CONFIG_DIR: &str = "EDM_CONFIG_DIR";

/// Location of the user-global registry, `<config dir>/edm/edm.yaml`.
///
/// `EDM_CONFIG_DIR` replaces `<config dir>/edm`. Falls back to `.edm` in the
/// current directory if the platform config directory cannot be determined.
pub fn default_edm_config_path() -> PathBuf {
    let dir = std::env::var_os(ENV_CONFIG_DIR)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from(".edm"))
                .join("edm")
        });
    dir.join("edm.yaml")
}

/// URL of a seed repository below `prefix`.
pub fn seed_url(prefix: &str, name: &str) -> String {
    format!("{}{}.git", prefix, name)
}
