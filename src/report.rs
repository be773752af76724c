//! Workspace reporter.
//!
//! Collects [`RepoState`] for the first-level directories of a working
//! directory and formats one line per repository:
//!
//! ```text
//! "everest-core" @ branch: main [remote: origin/main] [behind 1] [clean]
//! "libocpp" @ tag: v0.16.0 [detached HEAD @ 5b2c0a1...] [dirty]
//! ```
//!
//! Nothing here mutates a repository except [`pull_all`].

use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

use crate::error::Result;
use crate::manifest::{dir_name, first_level_dirs};
use crate::output::OutputConfig;
use crate::repository::{GitOperations, RepoState};

/// State of one directory of the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoReport {
    pub name: String,
    pub path: PathBuf,
    pub state: RepoState,
}

/// Returns the directories to report on, restricted to `names` unless empty.
fn selected_dirs(working_dir: &Path, names: &[String]) -> Result<Vec<(String, PathBuf)>> {
    Ok(first_level_dirs(working_dir)?
        .into_iter()
        .filter_map(|path| dir_name(&path).map(|name| (name, path)))
        .filter(|(name, _)| {
            let selected = names.is_empty() || names.contains(name);
            if !selected {
                debug!(
                    "Skipping {} because it is not in the list of provided repos.",
                    name
                );
            }
            selected
        })
        .collect())
}

/// Collects the state of every (or every named) directory of `working_dir`.
///
/// With `fetch`, a failed fetch is recorded on the report and collection
/// continues with stale upstream data.
pub fn collect(
    git: &dyn GitOperations,
    working_dir: &Path,
    names: &[String],
    fetch: bool,
) -> Result<Vec<RepoReport>> {
    Ok(selected_dirs(working_dir, names)?
        .into_iter()
        .map(|(name, path)| RepoReport {
            state: git.repo_state(&path, fetch),
            name,
            path,
        })
        .collect())
}

/// Formats one report line. Returns `None` for non-repositories.
pub fn format_line(report: &RepoReport, out: &OutputConfig) -> Option<String> {
    let state = &report.state;
    if !state.is_repo {
        return None;
    }

    let mut line = format!("\"{}\"", out.green(&report.name));
    if let Some(tag) = &state.tag {
        line.push_str(&format!(" @ tag: {}", tag));
    }
    if let Some(branch) = &state.branch {
        line.push_str(&format!(" @ branch: {}", branch));
    }

    if state.detached {
        let rev = state.rev.as_deref().unwrap_or_default();
        line.push_str(&format!(" [{}]", out.yellow(format!("detached HEAD @ {}", rev))));
    } else if let Some(remote) = &state.remote_branch {
        line.push_str(&format!(" [remote: {}]", out.red(remote)));
        let mut counts = Vec::new();
        if state.behind > 0 {
            counts.push(format!("behind {}", out.red(state.behind)));
        }
        if state.ahead > 0 {
            counts.push(format!("ahead {}", out.green(state.ahead)));
        }
        if !counts.is_empty() {
            line.push_str(&format!(" [{}]", counts.join(" ")));
        }
    }

    if state.fetch_worked == Some(false) {
        line.push_str(&format!(" [{}]", out.red("fetch failed")));
    }

    if state.dirty {
        line.push_str(&format!(" [{}]", out.red("dirty")));
    } else {
        line.push_str(&format!(" [{}]", out.green("clean")));
    }
    Some(line)
}

/// Number of repositories and how many of them are dirty.
pub fn dirty_count(reports: &[RepoReport]) -> (usize, usize) {
    let repos = reports.iter().filter(|r| r.state.is_repo);
    let total = repos.clone().count();
    let dirty = repos.filter(|r| r.state.dirty).count();
    (dirty, total)
}

/// Formats every report plus the dirty summary when something is dirty.
pub fn format_report(reports: &[RepoReport], out: &OutputConfig) -> Vec<String> {
    let mut lines: Vec<String> = reports
        .iter()
        .filter_map(|report| {
            let line = format_line(report, out);
            if line.is_none() {
                debug!("\"{}\" is not a git repository.", report.name);
            }
            line
        })
        .collect();
    let (dirty, total) = dirty_count(reports);
    if dirty > 0 {
        lines.push(format!("{}/{} repositories are dirty.", dirty, total));
    }
    lines
}

/// Outcome of pulling one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullReport {
    pub name: String,
    pub pulled: bool,
}

/// Pulls every (or every named) repository of `working_dir`. Directories that
/// are not repositories are skipped.
pub fn pull_all(
    git: &dyn GitOperations,
    working_dir: &Path,
    names: &[String],
) -> Result<Vec<PullReport>> {
    Ok(selected_dirs(working_dir, names)?
        .into_iter()
        .filter(|(name, path)| {
            let is_repo = git.is_repo(path);
            if !is_repo {
                debug!("\"{}\" is not a git repository.", name);
            }
            is_repo
        })
        .map(|(name, path)| PullReport {
            pulled: git.pull(&path),
            name,
        })
        .collect())
}

/// Formats pull results plus a failure summary when something failed.
pub fn format_pull_report(reports: &[PullReport], out: &OutputConfig) -> Vec<String> {
    let mut lines: Vec<String> = reports
        .iter()
        .map(|report| {
            let status = if report.pulled {
                out.green("pulled")
            } else {
                out.red("error during git-pull")
            };
            format!("\"{}\"[{}]", out.green(&report.name), status)
        })
        .collect();
    let failed = reports.iter().filter(|r| !r.pulled).count();
    if failed > 0 {
        lines.push(format!(
            "{}/{} repositories could not be pulled.",
            failed,
            reports.len()
        ));
    }
    lines
}
