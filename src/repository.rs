//! # Repository Access
//!
//! This module puts a trait between the workspace logic and the [`crate::git`]
//! driver. The materializer, resolver, snapshot engine and reporter all take a
//! `&dyn GitOperations`, so their policies can be tested against a mock that
//! records calls and returns canned answers, while the binary uses
//! [`DefaultGitOperations`], which shells out to `git`.
//!
//! It also defines [`RepoState`], the per-repository record that the reporter
//! prints and the snapshot engine pins.

use std::path::Path;

use serde::Serialize;

use crate::error::Result;

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    fn is_repo(&self, path: &Path) -> bool;
    fn is_dirty(&self, path: &Path) -> bool;
    fn is_detached(&self, path: &Path) -> bool;
    fn current_rev(&self, path: &Path) -> Option<String>;
    fn current_short_rev(&self, path: &Path) -> Option<String>;
    fn current_branch(&self, path: &Path) -> Option<String>;
    fn current_tag(&self, path: &Path) -> Option<String>;
    fn remote_url(&self, path: &Path) -> Option<String>;
    fn upstream_branch(&self, path: &Path) -> Option<String>;
    fn ahead_behind(&self, path: &Path) -> Option<(u32, u32)>;
    fn infer_branches(&self, path: &Path) -> Vec<String>;

    fn fetch(&self, path: &Path) -> bool;
    fn pull(&self, path: &Path) -> bool;
    fn checkout(&self, path: &Path, rev: &str) -> bool;
    fn clone_repo(&self, url: &str, dest: &Path, branch: Option<&str>) -> Result<()>;

    fn remote_tags(&self, url: &str) -> Vec<String>;
    fn remote_branches(&self, url: &str) -> Vec<String>;
    fn is_tag(&self, url: &str, name: &str) -> bool;
    fn remote_rev(&self, url: &str, reference: &str) -> Result<String>;

    /// Collects the full state record of the repository at `path`.
    ///
    /// When `fetch` is set, `git fetch` runs first; a failed fetch is recorded
    /// and the remaining fields reflect the stale upstream data.
    fn repo_state(&self, path: &Path, fetch: bool) -> RepoState {
        if !self.is_repo(path) {
            return RepoState::default();
        }
        let fetch_worked = fetch.then(|| self.fetch(path));
        let (ahead, behind) = self.ahead_behind(path).unwrap_or((0, 0));
        RepoState {
            is_repo: true,
            fetch_worked,
            url: self.remote_url(path),
            rev: self.current_rev(path),
            short_rev: self.current_short_rev(path),
            tag: self.current_tag(path),
            branch: self.current_branch(path),
            remote_branch: self.upstream_branch(path),
            ahead,
            behind,
            dirty: self.is_dirty(path),
            detached: self.is_detached(path),
        }
    }
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command to perform real Git operations.
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn is_repo(&self, path: &Path) -> bool {
        crate::git::is_repo(path)
    }

    fn is_dirty(&self, path: &Path) -> bool {
        crate::git::is_dirty(path)
    }

    fn is_detached(&self, path: &Path) -> bool {
        crate::git::is_detached(path)
    }

    fn current_rev(&self, path: &Path) -> Option<String> {
        crate::git::current_rev(path)
    }

    fn current_short_rev(&self, path: &Path) -> Option<String> {
        crate::git::current_short_rev(path)
    }

    fn current_branch(&self, path: &Path) -> Option<String> {
        crate::git::current_branch(path)
    }

    fn current_tag(&self, path: &Path) -> Option<String> {
        crate::git::current_tag(path)
    }

    fn remote_url(&self, path: &Path) -> Option<String> {
        crate::git::remote_url(path)
    }

    fn upstream_branch(&self, path: &Path) -> Option<String> {
        crate::git::upstream_branch(path)
    }

    fn ahead_behind(&self, path: &Path) -> Option<(u32, u32)> {
        crate::git::ahead_behind(path)
    }

    fn infer_branches(&self, path: &Path) -> Vec<String> {
        crate::git::infer_branches(path)
    }

    fn fetch(&self, path: &Path) -> bool {
        crate::git::fetch(path)
    }

    fn pull(&self, path: &Path) -> bool {
        crate::git::pull(path)
    }

    fn checkout(&self, path: &Path, rev: &str) -> bool {
        crate::git::checkout(path, rev)
    }

    fn clone_repo(&self, url: &str, dest: &Path, branch: Option<&str>) -> Result<()> {
        crate::git::clone(url, dest, branch)
    }

    fn remote_tags(&self, url: &str) -> Vec<String> {
        crate::git::remote_tags(url)
    }

    fn remote_branches(&self, url: &str) -> Vec<String> {
        crate::git::remote_branches(url)
    }

    fn is_tag(&self, url: &str, name: &str) -> bool {
        crate::git::is_tag(url, name)
    }

    fn remote_rev(&self, url: &str, reference: &str) -> Result<String> {
        crate::git::remote_rev(url, reference)
    }
}

/// Observed git state of one repository. Recomputed on demand, never persisted
/// on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoState {
    pub is_repo: bool,
    /// `None` when no fetch was requested.
    pub fetch_worked: Option<bool>,
    pub url: Option<String>,
    pub rev: Option<String>,
    pub short_rev: Option<String>,
    pub tag: Option<String>,
    pub branch: Option<String>,
    pub remote_branch: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub dirty: bool,
    pub detached: bool,
}

#[cfg(test)]
pub(crate) mod mock {
    //! A scriptable `GitOperations` used by unit tests across the crate.

    use super::*;
    use crate::error::Error;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// State of a fake repository on disk.
    #[derive(Debug, Clone, Default)]
    pub struct FakeRepo {
        pub url: Option<String>,
        pub rev: String,
        pub tag: Option<String>,
        pub branch: Option<String>,
        pub containing_branches: Vec<String>,
        pub dirty: bool,
        pub upstream: Option<String>,
        pub ahead_behind: Option<(u32, u32)>,
    }

    /// Mock git operations for testing. Paths are compared by their final
    /// component so tests can use any workspace root. A successful clone
    /// creates the destination directory.
    #[derive(Default)]
    pub struct MockGitOperations {
        pub repos: Mutex<HashMap<String, FakeRepo>>,
        /// Refs that `clone_repo` accepts as `--branch` values per URL.
        pub clonable: HashMap<String, HashSet<String>>,
        pub remote_tags: HashMap<String, Vec<String>>,
        pub remote_branches: HashMap<String, Vec<String>>,
        /// `url -> ref -> rev`
        pub remote_revs: HashMap<String, HashMap<String, String>>,
        pub failing_fetch: HashSet<String>,
        /// Revisions that `checkout` cannot find.
        pub unknown_revs: HashSet<String>,
        pub calls: Mutex<Vec<String>>,
    }

    fn key(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    impl MockGitOperations {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_repo(self, name: &str, repo: FakeRepo) -> Self {
            self.repos.lock().unwrap().insert(name.to_string(), repo);
            self
        }

        pub fn with_unknown_rev(mut self, rev: &str) -> Self {
            self.unknown_revs.insert(rev.to_string());
            self
        }

        pub fn with_clonable(mut self, url: &str, refs: &[&str]) -> Self {
            self.clonable
                .entry(url.to_string())
                .or_default()
                .extend(refs.iter().map(|r| r.to_string()));
            self
        }

        pub fn with_remote_rev(mut self, url: &str, reference: &str, rev: &str) -> Self {
            self.remote_revs
                .entry(url.to_string())
                .or_default()
                .insert(reference.to_string(), rev.to_string());
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn repo(&self, path: &Path) -> Option<FakeRepo> {
            self.repos.lock().unwrap().get(&key(path)).cloned()
        }
    }

    impl GitOperations for MockGitOperations {
        fn is_repo(&self, path: &Path) -> bool {
            self.repo(path).is_some()
        }

        fn is_dirty(&self, path: &Path) -> bool {
            self.repo(path).is_some_and(|r| r.dirty)
        }

        fn is_detached(&self, path: &Path) -> bool {
            self.repo(path).is_some_and(|r| r.branch.is_none())
        }

        fn current_rev(&self, path: &Path) -> Option<String> {
            self.repo(path).map(|r| r.rev)
        }

        fn current_short_rev(&self, path: &Path) -> Option<String> {
            self.repo(path).map(|r| r.rev.chars().take(7).collect())
        }

        fn current_branch(&self, path: &Path) -> Option<String> {
            self.repo(path).and_then(|r| r.branch)
        }

        fn current_tag(&self, path: &Path) -> Option<String> {
            self.repo(path).and_then(|r| r.tag)
        }

        fn remote_url(&self, path: &Path) -> Option<String> {
            self.repo(path).and_then(|r| r.url)
        }

        fn upstream_branch(&self, path: &Path) -> Option<String> {
            self.repo(path).and_then(|r| r.upstream)
        }

        fn ahead_behind(&self, path: &Path) -> Option<(u32, u32)> {
            self.repo(path).and_then(|r| r.ahead_behind)
        }

        fn infer_branches(&self, path: &Path) -> Vec<String> {
            self.repo(path)
                .map(|r| r.containing_branches)
                .unwrap_or_default()
        }

        fn fetch(&self, path: &Path) -> bool {
            self.record(format!("fetch {}", key(path)));
            !self.failing_fetch.contains(&key(path))
        }

        fn pull(&self, path: &Path) -> bool {
            self.record(format!("pull {}", key(path)));
            true
        }

        fn checkout(&self, path: &Path, rev: &str) -> bool {
            self.record(format!("checkout {} {}", key(path), rev));
            if self.unknown_revs.contains(rev) {
                return false;
            }
            let mut repos = self.repos.lock().unwrap();
            match repos.get_mut(&key(path)) {
                Some(repo) => {
                    repo.rev = rev.to_string();
                    repo.branch = None;
                    true
                }
                None => false,
            }
        }

        fn clone_repo(&self, url: &str, dest: &Path, branch: Option<&str>) -> Result<()> {
            self.record(format!(
                "clone {} {} {}",
                url,
                key(dest),
                branch.unwrap_or("-")
            ));
            let accepted = match branch {
                None => true,
                Some(b) => self.clonable.get(url).is_some_and(|refs| refs.contains(b)),
            };
            if !accepted {
                return Err(Error::LocalCheckout {
                    name: key(dest),
                    url: url.to_string(),
                    r#ref: branch.unwrap_or_default().to_string(),
                    message: "Remote branch not found".to_string(),
                });
            }
            let _ = std::fs::create_dir_all(dest);
            self.repos.lock().unwrap().insert(
                key(dest),
                FakeRepo {
                    url: Some(url.to_string()),
                    rev: format!("{}-head", key(dest)),
                    branch: Some(branch.unwrap_or("main").to_string()),
                    ..FakeRepo::default()
                },
            );
            Ok(())
        }

        fn remote_tags(&self, url: &str) -> Vec<String> {
            self.remote_tags.get(url).cloned().unwrap_or_default()
        }

        fn remote_branches(&self, url: &str) -> Vec<String> {
            self.remote_branches.get(url).cloned().unwrap_or_default()
        }

        fn is_tag(&self, url: &str, name: &str) -> bool {
            self.record(format!("is_tag {} {}", url, name));
            self.remote_tags
                .get(url)
                .is_some_and(|tags| tags.iter().any(|t| t == name))
        }

        fn remote_rev(&self, url: &str, reference: &str) -> Result<String> {
            self.record(format!("remote_rev {} {}", url, reference));
            self.remote_revs
                .get(url)
                .and_then(|refs| refs.get(reference))
                .cloned()
                .ok_or_else(|| Error::RemoteRef {
                    url: url.to_string(),
                    r#ref: reference.to_string(),
                    message: "ref not found on remote".to_string(),
                })
        }
    }
}
