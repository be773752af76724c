//! Snapshot engine.
//!
//! A snapshot is a config in which every repository of the workspace is
//! pinned to the commit it currently has checked out. Besides `git_rev` each
//! pinned entry records a branch so that the snapshot stays readable:
//!
//! 1. the current branch, if HEAD is attached;
//! 2. otherwise the greatest `release/*` remote branch containing HEAD;
//! 3. otherwise `main`, then `everest`, if one of them contains HEAD;
//! 4. otherwise the empty string.

use std::path::Path;

use log::{debug, warn};

use crate::error::Result;
use crate::manifest::{dir_name, first_level_dirs, Dependencies, Dependency};
use crate::repository::GitOperations;

/// Default branch names tried, in order, for a detached HEAD.
pub const DEFAULT_BRANCHES: [&str; 2] = ["main", "everest"];

const RELEASE_BRANCH_PREFIX: &str = "release/";

/// Picks the branch recorded for a detached HEAD from the remote branches
/// containing it.
pub fn choose_branch(branches: &[String]) -> String {
    if let Some(release) = branches
        .iter()
        .filter(|b| b.starts_with(RELEASE_BRANCH_PREFIX))
        .max()
    {
        return release.clone();
    }
    DEFAULT_BRANCHES
        .iter()
        .find(|default| branches.iter().any(|b| b == *default))
        .map(|b| b.to_string())
        .unwrap_or_default()
}

/// Pins every repository below `working_dir`, starting from `config`.
///
/// Repositories missing from `config` get an entry with their origin URL.
/// Config entries without a directory on disk are returned unchanged. A
/// directory that is not a repository never yields an entry, even if the
/// config names it.
pub fn create_snapshot(
    git: &dyn GitOperations,
    working_dir: &Path,
    config: &Dependencies,
) -> Result<Dependencies> {
    let mut snapshot = config.clone();
    for path in first_level_dirs(working_dir)? {
        let Some(name) = dir_name(&path) else {
            continue;
        };
        let state = git.repo_state(&path, false);
        if !state.is_repo {
            debug!("{} is not a repo, path: {}", name, path.display());
            if snapshot.remove(&name).is_some() {
                warn!(
                    "Dropping \"{}\" from snapshot: {} is not a git repository.",
                    name,
                    path.display()
                );
            }
            continue;
        }

        let entry = snapshot
            .entry(name)
            .or_insert_with(|| Dependency {
                git: state.url.clone(),
                ..Dependency::default()
            });
        entry.git_rev = state.rev.clone();
        entry.branch = Some(match state.branch.filter(|b| !b.is_empty()) {
            Some(branch) => branch,
            None => choose_branch(&git.infer_branches(&path)),
        });
        if let Some(tag) = state.tag {
            entry.git_tag = Some(tag);
        }
    }
    Ok(snapshot)
}
