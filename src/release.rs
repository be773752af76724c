//! # Release Manifests
//!
//! After a CMake configure run, CPM leaves one file per package in
//! `<build>/CPM_modules/`, each starting with a line such as
//!
//! ```text
//! CPMAddPackage("NAME;libocpp;GIT_REPOSITORY;https://...;GIT_TAG;v0.16.0;SOURCE_DIR;/ws/libocpp")
//! ```
//!
//! This module turns those files, the `everest-core` checkout and an optional
//! metadata document into a JSON release manifest:
//!
//! ```json
//! {"channel": "stable", "datetime": "2024-09-01T12:00:00.000000Z", "version": "2024.9.0",
//!  "components": [{"name": "libocpp", "version": "v0.16.0", "description": "...", "license": "Apache-2.0"}]}
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use log::info;
use serde::Serialize;

use crate::config::write_atomic;
use crate::error::{Error, Result};
use crate::manifest::yaml_scalar_to_string;
use crate::repository::{GitOperations, RepoState};
use crate::settings::Settings;

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const METADATA_FILE_NAME: &str = "everest-metadata.yaml";
const CPM_MODULES_DIR: &str = "CPM_modules";
const CPM_ADD_PACKAGE: &str = "CPMAddPackage(";
const UNKNOWN_LICENSE: &str = "unknown";

/// Fields of a `CPMAddPackage` call recorded by CPM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpmPackage {
    pub name: Option<String>,
    pub git_repository: Option<String>,
    pub git_tag: Option<String>,
    pub source_dir: Option<String>,
}

/// Parses the `;`-separated argument list of a recorded `CPMAddPackage` line.
/// Returns `None` for any other line.
pub fn parse_cpm_add_package(line: &str) -> Option<CpmPackage> {
    let args = line
        .trim()
        .strip_prefix(CPM_ADD_PACKAGE)?
        .trim_end_matches(')')
        .trim_matches('"');
    let fields: Vec<&str> = args.split(';').collect();
    let value_of = |key: &str| {
        fields
            .iter()
            .position(|field| *field == key)
            .and_then(|i| fields.get(i + 1))
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
    };
    Some(CpmPackage {
        name: value_of("NAME"),
        git_repository: value_of("GIT_REPOSITORY"),
        git_tag: value_of("GIT_TAG"),
        source_dir: value_of("SOURCE_DIR"),
    })
}

/// Version string of a checkout: its tag, else `branch@short_rev`, else the
/// revision.
pub fn repo_version(state: &RepoState) -> Option<String> {
    if let Some(tag) = &state.tag {
        return Some(tag.clone());
    }
    if let (Some(branch), Some(short_rev)) = (&state.branch, &state.short_rev) {
        return Some(format!("{}@{}", branch, short_rev));
    }
    state.rev.clone()
}

/// Reads one CPM module file and returns `(name, version)`.
fn read_cpm_module(git: &dyn GitOperations, path: &Path) -> Result<Option<(String, String)>> {
    let content = fs::read_to_string(path)?;
    let Some(package) = content.lines().find_map(parse_cpm_add_package) else {
        return Ok(None);
    };
    let release_error = |message: String| Error::Release { message };

    let name = package
        .name
        .clone()
        .ok_or_else(|| release_error(format!("no NAME found in {}", path.display())))?;
    let mut version = package.git_tag.clone();
    if package.git_repository.is_none() {
        if let Some(source_dir) = &package.source_dir {
            let state = git.repo_state(Path::new(source_dir), false);
            if state.tag.is_some() || state.branch.is_some() {
                version = repo_version(&state).or(version);
            }
        }
    }
    let version = version.ok_or_else(|| {
        release_error(format!(
            "no source dir found for {}, cannot determine git tag",
            name
        ))
    })?;
    Ok(Some((name, version)))
}

/// One component of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    pub name: String,
    pub version: String,
    pub description: String,
    pub license: String,
}

/// The JSON release manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseManifest {
    pub channel: String,
    pub datetime: String,
    pub version: String,
    pub components: Vec<Component>,
}

/// Builds a component, filling in metadata when `metadata` knows `key`.
fn component(metadata: &serde_yaml::Mapping, key: &str, version: &str) -> Component {
    let entry = metadata.get(key);
    let field = |field: &str| {
        entry
            .and_then(|e| e.get(field))
            .and_then(yaml_scalar_to_string)
    };
    Component {
        name: field("name").unwrap_or_else(|| key.to_string()),
        version: version.to_string(),
        description: field("description").unwrap_or_default(),
        license: field("license").unwrap_or_else(|| UNKNOWN_LICENSE.to_string()),
    }
}

fn swapcase(s: &str) -> String {
    s.chars()
        .flat_map(|c| {
            if c.is_uppercase() {
                c.to_lowercase().collect::<Vec<_>>()
            } else {
                c.to_uppercase().collect::<Vec<_>>()
            }
        })
        .collect()
}

/// Assembles the release manifest from `(name, version)` pairs.
///
/// Components are ordered by name with lower case before upper case. With
/// `include_all`, metadata entries that were not built are appended with an
/// empty version.
pub fn assemble_release(
    core_version: &str,
    mut versions: Vec<(String, String)>,
    metadata: &serde_yaml::Mapping,
    channel: &str,
    include_all: bool,
) -> ReleaseManifest {
    versions.sort_by_key(|(name, _)| swapcase(name));
    let mut components: Vec<Component> = versions
        .iter()
        .map(|(name, version)| component(metadata, name, version))
        .collect();

    if include_all {
        for key in metadata.keys().filter_map(yaml_scalar_to_string) {
            let extra = component(metadata, &key, "");
            if !components.iter().any(|c| c.name == extra.name) {
                components.push(extra);
            }
        }
    }

    ReleaseManifest {
        channel: channel.to_string(),
        datetime: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
        version: core_version.to_string(),
        components,
    }
}

/// Downloads the metadata document to `dest`.
pub fn download_metadata(url: &str, dest: &Path) -> Result<()> {
    let release_error = |e: ureq::Error| Error::Release {
        message: format!("could not download {}: {}", url, e),
    };
    let agent = ureq::Agent::config_builder()
        .timeout_global(Some(METADATA_TIMEOUT))
        .build()
        .new_agent();
    let mut response = agent.get(url).call().map_err(release_error)?;
    let body = response.body_mut().read_to_vec().map_err(release_error)?;
    write_atomic(dest, &body)
}

/// Locates the metadata file, downloading it into the build directory if
/// neither the configured file nor a previous download exists. A failed
/// download is logged and the release is built without metadata.
pub fn resolve_metadata(settings: &Settings, build_dir: &Path, url: &str) -> Option<PathBuf> {
    if let Some(file) = &settings.metadata_file {
        return Some(file.clone());
    }
    let path = build_dir.join(METADATA_FILE_NAME);
    if !path.exists() {
        info!("No metadata.yaml provided, downloading...");
        if let Err(e) = download_metadata(url, &path) {
            info!(
                "Could not download metadata file, creating release.json without metadata: {}",
                e
            );
        }
    }
    Some(path)
}

fn load_metadata(path: Option<&Path>) -> Result<serde_yaml::Mapping> {
    let Some(path) = path.filter(|p| p.exists()) else {
        return Ok(serde_yaml::Mapping::new());
    };
    info!("Using metadata file: {}", path.display());
    let value: serde_yaml::Value = serde_yaml::from_str(&fs::read_to_string(path)?)?;
    Ok(match value {
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => serde_yaml::Mapping::new(),
    })
}

/// Builds the release manifest for a build directory.
pub fn create_release(
    git: &dyn GitOperations,
    everest_core_dir: &Path,
    build_dir: &Path,
    settings: &Settings,
    metadata_url: &str,
) -> Result<ReleaseManifest> {
    let metadata_path = resolve_metadata(settings, build_dir, metadata_url);
    let metadata = load_metadata(metadata_path.as_deref())?;

    let core_state = git.repo_state(everest_core_dir, false);
    let core_version = repo_version(&core_state).unwrap_or_else(|| "unknown".to_string());
    let mut versions = vec![("everest-core".to_string(), core_version.clone())];

    let modules_dir = build_dir.join(CPM_MODULES_DIR);
    let mut module_files: Vec<PathBuf> = fs::read_dir(&modules_dir)
        .map_err(|e| Error::Release {
            message: format!("cannot read {}: {}", modules_dir.display(), e),
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    module_files.sort();
    for file in module_files {
        if let Some((name, version)) = read_cpm_module(git, &file)? {
            versions.retain(|(existing, _)| existing != &name);
            versions.push((name, version));
        }
    }

    Ok(assemble_release(
        &core_version,
        versions,
        &metadata,
        &settings.update_channel,
        settings.metadata_include_all,
    ))
}

/// Writes the manifest as JSON to `out`.
pub fn write_release(manifest: &ReleaseManifest, out: &Path) -> Result<()> {
    let json = serde_json::to_string(manifest)?;
    write_atomic(out, json.as_bytes())?;
    info!("Wrote release manifest \"{}\"", out.display());
    Ok(())
}
