//! # Dependency Manifests
//!
//! This module defines the dependency data model shared by every other part of
//! the tool, and the scanner that reads per-repository `dependencies.yaml`
//! manifests.
//!
//! ## Format
//!
//! A manifest (and equally a workspace config or a snapshot) is a YAML mapping
//! from dependency name to entry:
//!
//! ```yaml
//! libocpp:
//!   git: https://github.com/EVerest/libocpp.git
//!   git_tag: v0.16.0
//!   cmake_condition: "EVEREST_DEPENDENCY_ENABLED_LIBOCPP"
//! everest-framework:
//!   git: https://github.com/EVerest/everest-framework.git
//!   git_tag: main
//!   git_rev: 5b2c0a1...
//!   branch: main
//! ```
//!
//! Unknown keys are tolerated and carried through unchanged, so a config
//! written by a newer tool survives a round trip through an older one.
//!
//! ## Scanning
//!
//! [`scan_dependencies`] walks a directory tree for `dependencies.yaml` /
//! `dependencies.yml`, skipping anything below a `_deps` directory (the
//! in-tree source cache of the C++ package manager) unless asked otherwise.
//! Manifests are merged in path order with a last-wins policy. A malformed
//! manifest is logged and skipped.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::repository::GitOperations;

/// File names recognised as dependency manifests.
pub const MANIFEST_FILE_NAMES: [&str; 2] = ["dependencies.yaml", "dependencies.yml"];

/// Remote patterns that count as "internal" when assembling a config.
pub const DEFAULT_INCLUDE_REMOTES: [&str; 2] =
    ["git@github.com:EVerest/*", "https://github.com/EVerest/*"];

/// One dependency entry. Identity is the key it is stored under.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// Remote URL.
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub git: Option<String>,

    /// A branch, a tag or a revision. Which one is only known after asking the
    /// remote.
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub git_tag: Option<String>,

    /// Always a concrete revision.
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub git_rev: Option<String>,

    /// Preferred branch name. Snapshots always carry one, possibly empty.
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub branch: Option<String>,

    /// CMake expression guarding the package in the generated build file.
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub cmake_condition: Option<String>,

    /// CMake options passed to the package.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    /// Keys this tool does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Accepts strings, numbers and booleans for string fields, since YAML turns
/// `git_tag: 1.0` into a float.
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| yaml_scalar_to_string(&v)))
}

pub(crate) fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Dependency {
    /// Creates an entry pointing at `url`.
    pub fn with_git(url: impl Into<String>) -> Self {
        Self {
            git: Some(url.into()),
            ..Self::default()
        }
    }

    /// Non-empty `git_tag`, if any.
    pub fn tag(&self) -> Option<&str> {
        self.git_tag.as_deref().filter(|t| !t.is_empty())
    }

    /// Non-empty `git_rev`, if any.
    pub fn rev(&self) -> Option<&str> {
        self.git_rev.as_deref().filter(|r| !r.is_empty())
    }

    /// Non-empty `git` URL, if any.
    pub fn url(&self) -> Option<&str> {
        self.git.as_deref().filter(|u| !u.is_empty())
    }

    /// Returns true if `key` holds a value on this entry.
    pub fn has_key(&self, key: &str) -> bool {
        match key {
            "git" => self.git.is_some(),
            "git_tag" => self.git_tag.is_some(),
            "git_rev" => self.git_rev.is_some(),
            "branch" => self.branch.is_some(),
            "cmake_condition" => self.cmake_condition.is_some(),
            "options" => !self.options.is_empty(),
            other => self.extra.contains_key(other),
        }
    }

    /// Sets `key` to `value`, mapping well-known keys onto their fields.
    pub fn set_key(&mut self, key: &str, value: serde_yaml::Value) {
        match key {
            "git" => self.git = yaml_scalar_to_string(&value),
            "git_tag" => self.git_tag = yaml_scalar_to_string(&value),
            "git_rev" => self.git_rev = yaml_scalar_to_string(&value),
            "branch" => self.branch = yaml_scalar_to_string(&value),
            "cmake_condition" => self.cmake_condition = yaml_scalar_to_string(&value),
            "options" => {
                self.options = match &value {
                    serde_yaml::Value::Sequence(items) => {
                        items.iter().filter_map(yaml_scalar_to_string).collect()
                    }
                    other => yaml_scalar_to_string(other).into_iter().collect(),
                }
            }
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }

    /// Removes `key` from this entry.
    pub fn remove_key(&mut self, key: &str) {
        match key {
            "git" => self.git = None,
            "git_tag" => self.git_tag = None,
            "git_rev" => self.git_rev = None,
            "branch" => self.branch = None,
            "cmake_condition" => self.cmake_condition = None,
            "options" => self.options.clear(),
            other => {
                self.extra.remove(other);
            }
        }
    }
}

/// Name-ordered mapping from dependency name to entry.
pub type Dependencies = BTreeMap<String, Dependency>;

/// Parses a manifest, config or snapshot document.
///
/// An empty document yields an empty map. Entries with no body (`name:`) are
/// kept as empty entries.
pub fn parse_dependencies(content: &str, source: &Path) -> Result<Dependencies> {
    let parse_error = |message: String| Error::ConfigParse {
        path: source.to_path_buf(),
        message,
    };
    let value: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;

    let mapping = match value {
        serde_yaml::Value::Null => return Ok(Dependencies::new()),
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => return Err(parse_error("top level is not a mapping".to_string())),
    };

    let mut dependencies = Dependencies::new();
    for (name, entry) in mapping {
        let name = yaml_scalar_to_string(&name)
            .ok_or_else(|| parse_error(format!("invalid dependency name {:?}", name)))?;
        let dependency = match entry {
            serde_yaml::Value::Null => Dependency::default(),
            entry => serde_yaml::from_value(entry)
                .map_err(|e| parse_error(format!("dependency \"{}\": {}", name, e)))?,
        };
        dependencies.insert(name, dependency);
    }
    Ok(dependencies)
}

/// Finds every manifest below `root`, sorted by path.
///
/// Files below a `_deps` directory are skipped unless `include_deps` is set.
pub fn find_manifests(root: &Path, include_deps: bool) -> Vec<PathBuf> {
    let mut manifests: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            MANIFEST_FILE_NAMES
                .iter()
                .any(|name| entry.file_name() == *name)
        })
        .map(|entry| entry.into_path())
        .filter(|path| {
            if include_deps || !in_deps_dir(root, path) {
                return true;
            }
            info!(
                "Ignoring dependencies in \"{}\" because this file is located in a \"_deps\" subdirectory.",
                path.display()
            );
            false
        })
        .collect();
    manifests.sort();
    manifests
}

fn in_deps_dir(root: &Path, manifest: &Path) -> bool {
    manifest
        .strip_prefix(root)
        .unwrap_or(manifest)
        .parent()
        .is_some_and(|parent| parent.components().any(|c| c.as_os_str() == "_deps"))
}

/// Result of a manifest scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Merged dependencies of all newly read manifests.
    pub dependencies: Dependencies,
    /// Manifests that were considered in this scan.
    pub files: Vec<PathBuf>,
}

/// Scans `root` for manifests and merges them (last wins).
///
/// Files listed in `already_scanned` are not read again.
pub fn scan_dependencies(
    root: &Path,
    include_deps: bool,
    already_scanned: &HashSet<PathBuf>,
) -> ScanResult {
    info!("Scanning \"{}\" for dependencies.", root.display());
    let mut result = ScanResult::default();

    for manifest in find_manifests(root, include_deps) {
        if already_scanned.contains(&manifest) {
            continue;
        }
        info!("Parsing dependencies file: {}", manifest.display());
        let parsed = fs::read_to_string(&manifest)
            .map_err(Error::from)
            .and_then(|content| parse_dependencies(&content, &manifest));
        match parsed {
            Ok(dependencies) => result.dependencies.extend(dependencies),
            Err(e) => error!("Error parsing yaml of \"{}\": {}", manifest.display(), e),
        }
        result.files.push(manifest);
    }
    result
}

/// Decides which remotes belong in an assembled config.
#[derive(Debug, Clone)]
pub struct RemoteFilter {
    patterns: Vec<glob::Pattern>,
    include_external: bool,
}

impl RemoteFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S], include_external: bool) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| glob::Pattern::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            include_external,
        })
    }

    /// A filter that lets every remote through.
    pub fn allow_all() -> Self {
        Self {
            patterns: Vec::new(),
            include_external: true,
        }
    }

    pub fn accepts(&self, url: &str) -> bool {
        if self.include_external {
            return true;
        }
        let matched = self.patterns.iter().find(|p| p.matches(url));
        if let Some(pattern) = matched {
            debug!("Pattern \"{}\" accepts string \"{}\"", pattern, url);
        }
        matched.is_some()
    }
}

impl Default for RemoteFilter {
    fn default() -> Self {
        // The default patterns are valid globs.
        Self {
            patterns: DEFAULT_INCLUDE_REMOTES
                .iter()
                .filter_map(|p| glob::Pattern::new(p).ok())
                .collect(),
            include_external: false,
        }
    }
}

/// Keeps the scanned dependencies whose remote passes `filter`.
pub fn config_from_dependencies(dependencies: &Dependencies, filter: &RemoteFilter) -> Dependencies {
    if filter.include_external {
        debug!("Including external dependencies in generated config.");
    }
    dependencies
        .iter()
        .filter(|(name, entry)| {
            let accepted = entry.url().is_some_and(|url| filter.accepts(url));
            if accepted {
                debug!("Adding \"{}\" to config.", name);
            } else {
                debug!(
                    "Did not add \"{}\" to generated config because it is an external dependency.",
                    name
                );
            }
            accepted
        })
        .map(|(name, entry)| (name.clone(), entry.clone()))
        .collect()
}

/// Adds first-level repositories of `working_dir` that are missing from `config`.
///
/// New entries get the origin URL and the current branch (or, when detached,
/// the exact tag). Repositories with neither are skipped with a warning.
pub fn add_workspace_repos(
    working_dir: &Path,
    mut config: Dependencies,
    filter: &RemoteFilter,
    git: &dyn GitOperations,
) -> Result<Dependencies> {
    for subdir in first_level_dirs(working_dir)? {
        let Some(name) = dir_name(&subdir) else {
            continue;
        };
        if config.contains_key(&name) {
            debug!("Skipping {} which already is in config.", name);
            continue;
        }
        if !git.is_repo(&subdir) {
            debug!("Skipping {} because it is not a git repository.", name);
            continue;
        }
        let Some(remote) = git.remote_url(&subdir) else {
            warn!("Skipping {} because remote could not be determined.", name);
            continue;
        };
        if !filter.accepts(&remote) {
            debug!("Skipping {} because it is an external dependency.", name);
            continue;
        }
        let Some(git_tag) = git
            .current_branch(&subdir)
            .or_else(|| git.current_tag(&subdir))
        else {
            warn!(
                "Skipping {} because no branch or tag could be determined.",
                name
            );
            continue;
        };
        debug!("  remote: {}, git_tag: {}", remote, git_tag);
        config.insert(
            name,
            Dependency {
                git: Some(remote),
                git_tag: Some(git_tag),
                ..Dependency::default()
            },
        );
    }
    Ok(config)
}

/// First-level subdirectories of `dir`, sorted by name. Hidden directories are
/// skipped.
pub fn first_level_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if path.is_dir() && !hidden {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub(crate) fn dir_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::mock::{FakeRepo, MockGitOperations};
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
libocpp:
  git: https://github.com/EVerest/libocpp.git
  git_tag: v0.16.0
  cmake_condition: "EVEREST_DEPENDENCY_ENABLED_LIBOCPP"
nlohmann_json:
  git: https://github.com/nlohmann/json
  git_tag: v3.11.2
  options: ["JSON_BuildTests OFF", "JSON_MultipleHeaders ON"]
"#;

    #[test]
    fn test_parse_dependencies() {
        let deps = parse_dependencies(MANIFEST, Path::new("dependencies.yaml")).unwrap();
        assert_eq!(deps.len(), 2);
        let libocpp = &deps["libocpp"];
        assert_eq!(libocpp.url(), Some("https://github.com/EVerest/libocpp.git"));
        assert_eq!(libocpp.tag(), Some("v0.16.0"));
        assert_eq!(
            libocpp.cmake_condition.as_deref(),
            Some("EVEREST_DEPENDENCY_ENABLED_LIBOCPP")
        );
        assert_eq!(deps["nlohmann_json"].options.len(), 2);
    }

    #[test]
    fn test_parse_numeric_tag_and_empty_entry() {
        let deps = parse_dependencies(
            "a:\n  git: x\n  git_tag: 1.5\nb:\n",
            Path::new("d.yaml"),
        )
        .unwrap();
        assert_eq!(deps["a"].tag(), Some("1.5"));
        assert_eq!(deps["b"], Dependency::default());
    }

    #[test]
    fn test_parse_preserves_unknown_keys() {
        let deps = parse_dependencies(
            "a:\n  git: x\n  custom_key: [1, 2]\n",
            Path::new("d.yaml"),
        )
        .unwrap();
        assert!(deps["a"].extra.contains_key("custom_key"));
        let written = serde_yaml::to_string(&deps).unwrap();
        assert!(written.contains("custom_key"));
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(parse_dependencies("", Path::new("d.yaml")).unwrap().is_empty());
        assert!(parse_dependencies("# nothing\n", Path::new("d.yaml"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_rejects_non_mapping() {
        let err = parse_dependencies("- a\n- b\n", Path::new("d.yaml")).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_set_and_remove_keys() {
        let mut dep = Dependency::with_git("x");
        dep.set_key("git_tag", serde_yaml::Value::String("main".into()));
        dep.set_key("custom", serde_yaml::Value::Bool(true));
        assert!(dep.has_key("git_tag"));
        assert!(dep.has_key("custom"));
        dep.remove_key("git_tag");
        dep.remove_key("custom");
        assert!(!dep.has_key("git_tag"));
        assert!(!dep.has_key("custom"));
    }

    #[test]
    fn test_scan_merges_last_wins_and_skips_deps_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::create_dir_all(root.join("build/_deps/foo-src")).unwrap();
        fs::write(root.join("a/dependencies.yaml"), "x:\n  git: a-url\n").unwrap();
        fs::write(root.join("b/dependencies.yml"), "x:\n  git: b-url\ny:\n  git: y\n").unwrap();
        fs::write(
            root.join("build/_deps/foo-src/dependencies.yaml"),
            "z:\n  git: z\n",
        )
        .unwrap();

        let result = scan_dependencies(root, false, &HashSet::new());
        assert_eq!(result.files.len(), 2);
        assert_eq!(result.dependencies["x"].url(), Some("b-url"));
        assert!(!result.dependencies.contains_key("z"));

        let with_deps = scan_dependencies(root, true, &HashSet::new());
        assert!(with_deps.dependencies.contains_key("z"));
    }

    #[test]
    fn test_scan_skips_already_scanned_and_malformed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::create_dir_all(root.join("bad")).unwrap();
        fs::write(root.join("a/dependencies.yaml"), "x:\n  git: a\n").unwrap();
        fs::write(root.join("bad/dependencies.yaml"), "x: [unclosed\n").unwrap();

        let first = scan_dependencies(root, false, &HashSet::new());
        assert_eq!(first.dependencies.len(), 1);
        assert_eq!(first.files.len(), 2);

        let seen: HashSet<PathBuf> = first.files.into_iter().collect();
        let second = scan_dependencies(root, false, &seen);
        assert!(second.dependencies.is_empty());
        assert!(second.files.is_empty());
    }

    #[test]
    fn test_remote_filter_default_patterns() {
        let filter = RemoteFilter::default();
        assert!(filter.accepts("https://github.com/EVerest/libocpp.git"));
        assert!(filter.accepts("git@github.com:EVerest/everest-core.git"));
        assert!(!filter.accepts("https://github.com/nlohmann/json"));
        assert!(RemoteFilter::allow_all().accepts("https://github.com/nlohmann/json"));
    }

    #[test]
    fn test_config_from_dependencies_filters_external() {
        let deps = parse_dependencies(MANIFEST, Path::new("d.yaml")).unwrap();
        let config = config_from_dependencies(&deps, &RemoteFilter::default());
        assert_eq!(config.keys().collect::<Vec<_>>(), vec!["libocpp"]);
        let all = config_from_dependencies(&deps, &RemoteFilter::new(&["*"], false).unwrap());
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_add_workspace_repos() {
        let temp = TempDir::new().unwrap();
        for name in ["everest-core", "detached", "external", "plain", "known"] {
            fs::create_dir_all(temp.path().join(name)).unwrap();
        }
        let git = MockGitOperations::new()
            .with_repo(
                "everest-core",
                FakeRepo {
                    url: Some("https://github.com/EVerest/everest-core.git".into()),
                    branch: Some("main".into()),
                    ..FakeRepo::default()
                },
            )
            .with_repo(
                "detached",
                FakeRepo {
                    url: Some("https://github.com/EVerest/detached.git".into()),
                    ..FakeRepo::default()
                },
            )
            .with_repo(
                "external",
                FakeRepo {
                    url: Some("https://example.com/external.git".into()),
                    branch: Some("main".into()),
                    ..FakeRepo::default()
                },
            )
            .with_repo("known", FakeRepo::default());

        let mut config = Dependencies::new();
        config.insert("known".into(), Dependency::with_git("kept"));
        let config =
            add_workspace_repos(temp.path(), config, &RemoteFilter::default(), &git).unwrap();

        assert_eq!(
            config.keys().cloned().collect::<Vec<_>>(),
            vec!["everest-core".to_string(), "known".to_string()]
        );
        assert_eq!(config["everest-core"].tag(), Some("main"));
        assert_eq!(config["known"].url(), Some("kept"));
    }
}
