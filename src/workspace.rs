//! # Workspace Materializer
//!
//! Places the source tree of every dependency at `<workspace>/<name>`.
//!
//! For each entry:
//!
//! - An existing dirty repository is left untouched.
//! - An existing clean repository is switched to `git_tag` (and then
//!   `git_rev`) unless the caller asked to keep the current branch.
//! - An existing path that is not a git repository is never mutated; it is
//!   reported and skipped.
//! - A missing directory is cloned, using `git_tag` as the clone-time branch.
//!   If that clone fails, one retry is made with `git_tag` reinterpreted as a
//!   revision (see [`CheckoutRefs::for_retry`]). After a successful clone a
//!   known `git_rev` is checked out; if that fails the dependency is not on
//!   the requested ref and the checkout fails.
//!
//! The module also describes an existing workspace directory for the CMake
//! path and maintains the VS Code `.code-workspace` file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::write_atomic;
use crate::error::{Error, Result};
use crate::manifest::{Dependencies, Dependency};
use crate::repository::GitOperations;

/// A dependency that is present in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalCheckout {
    pub name: String,
    pub path: PathBuf,
    /// The ref used for the checkout. `None` when the ref turned out to be a
    /// revision.
    pub git_tag: Option<String>,
}

/// The refs a checkout is attempted with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutRefs {
    pub tag: Option<String>,
    pub rev: Option<String>,
}

impl CheckoutRefs {
    pub fn of(dependency: &Dependency) -> Self {
        Self {
            tag: dependency.tag().map(str::to_string),
            rev: dependency.rev().map(str::to_string),
        }
    }

    /// Refs for the single retry after cloning with `tag` as branch failed.
    ///
    /// Without a `rev` the tag is assumed to be a revision; with both, the
    /// explicit `rev` wins. Either way the retry clones the default branch.
    /// Returns `None` when no tag was used, since there is nothing to
    /// reinterpret.
    pub fn for_retry(&self) -> Option<Self> {
        let tag = self.tag.as_ref()?;
        Some(Self {
            tag: None,
            rev: Some(self.rev.clone().unwrap_or_else(|| tag.clone())),
        })
    }
}

/// Materializes one dependency at `checkout_dir`.
///
/// Returns `Ok(None)` when the dependency was skipped.
pub fn checkout_dependency(
    git: &dyn GitOperations,
    name: &str,
    url: Option<&str>,
    refs: CheckoutRefs,
    checkout_dir: &Path,
    keep_branch: bool,
) -> Result<Option<LocalCheckout>> {
    info!("Setting up dependency \"{}\" in workspace", name);
    debug!("  git-remote: \"{}\"", url.unwrap_or_default());
    debug!("  git-tag: \"{}\"", refs.tag.as_deref().unwrap_or_default());
    debug!("  git-rev: \"{}\"", refs.rev.as_deref().unwrap_or_default());
    debug!("  local directory: \"{}\"", checkout_dir.display());

    if checkout_dir.exists() {
        debug!(
            "    ... the directory for dependency \"{}\" already exists at \"{}\".",
            name,
            checkout_dir.display()
        );
        if !checkout_dir.is_dir() || !git.is_repo(checkout_dir) {
            warn!(
                "Skipping dependency \"{}\": \"{}\" exists but is not a git repository.",
                name,
                checkout_dir.display()
            );
            return Ok(None);
        }
        if git.is_dirty(checkout_dir) {
            debug!("    Repo is dirty, nothing will be done to this repo.");
        } else if keep_branch {
            debug!("    Keeping currently checked out branch.");
        } else {
            if let Some(tag) = &refs.tag {
                debug!(
                    "    Repo is not dirty, checking out requested git tag \"{}\"",
                    tag
                );
                checkout_or_warn(git, checkout_dir, tag);
            }
            if let Some(rev) = &refs.rev {
                debug!("    Checking out requested git rev \"{}\"", rev);
                checkout_or_warn(git, checkout_dir, rev);
            }
        }
        return Ok(Some(LocalCheckout {
            name: name.to_string(),
            path: checkout_dir.to_path_buf(),
            git_tag: refs.tag,
        }));
    }

    let Some(url) = url else {
        warn!(
            "Skipping dependency \"{}\": no git remote given and not present in workspace.",
            name
        );
        return Ok(None);
    };

    let refs = match git.clone_repo(url, checkout_dir, refs.tag.as_deref()) {
        Ok(()) => refs,
        Err(e) => {
            let Some(retry) = refs.for_retry() else {
                return Err(e);
            };
            warn!("    {}", e);
            info!(
                "    git_tag \"{}\" might be a git_rev, trying to check out \"{}\" instead.",
                refs.tag.as_deref().unwrap_or_default(),
                retry.rev.as_deref().unwrap_or_default()
            );
            git.clone_repo(url, checkout_dir, None)?;
            retry
        }
    };

    if let Some(rev) = &refs.rev {
        debug!("    Checking out requested git rev \"{}\"", rev);
        if !git.checkout(checkout_dir, rev) {
            return Err(Error::LocalCheckout {
                name: name.to_string(),
                url: url.to_string(),
                r#ref: rev.clone(),
                message: format!("cloned, but \"{}\" cannot be checked out", rev),
            });
        }
    }

    Ok(Some(LocalCheckout {
        name: name.to_string(),
        path: checkout_dir.to_path_buf(),
        git_tag: refs.tag,
    }))
}

fn checkout_or_warn(git: &dyn GitOperations, dir: &Path, rev: &str) {
    if !git.checkout(dir, rev) {
        warn!("    Could not check out \"{}\" in \"{}\"", rev, dir.display());
    }
}

/// Materializes every entry of `config` below `workspace`.
///
/// A failed checkout aborts the whole set-up.
pub fn setup_workspace(
    git: &dyn GitOperations,
    workspace: &Path,
    config: &Dependencies,
) -> Result<Vec<LocalCheckout>> {
    info!("Setting up workspace \"{}\"", workspace.display());
    fs::create_dir_all(workspace)?;
    let mut checkouts = Vec::new();
    for (name, entry) in config {
        if let Some(checkout) = checkout_dependency(
            git,
            name,
            entry.url(),
            CheckoutRefs::of(entry),
            &workspace.join(name),
            false,
        )? {
            checkouts.push(checkout);
        }
    }
    info!("Done.");
    Ok(checkouts)
}

/// A workspace directory as seen from one of its repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceDirectory {
    pub workspace: PathBuf,
    /// Directory name -> currently checked out branch.
    pub local_dependencies: BTreeMap<String, Option<String>>,
}

impl WorkspaceDirectory {
    /// Lists the directories of `workspace` as candidate local dependencies.
    pub fn scan(git: &dyn GitOperations, workspace: &Path) -> Result<Self> {
        if !workspace.is_dir() {
            return Err(Error::Workspace {
                message: format!("{} is not a directory", workspace.display()),
            });
        }
        let mut local_dependencies = BTreeMap::new();
        for entry in fs::read_dir(workspace)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name() {
                local_dependencies.insert(
                    name.to_string_lossy().to_string(),
                    git.current_branch(&path),
                );
            }
        }
        Ok(Self {
            workspace: workspace.to_path_buf(),
            local_dependencies,
        })
    }
}

/// Registers the dependencies that are present in the workspace directory,
/// keeping whatever branch they currently have checked out.
pub fn checkout_local_dependencies(
    git: &dyn GitOperations,
    workspace: &WorkspaceDirectory,
    dependencies: &Dependencies,
) -> Result<Vec<LocalCheckout>> {
    let mut checkouts = Vec::new();
    for (name, branch) in &workspace.local_dependencies {
        let Some(dependency) = dependencies.get(name) else {
            debug!(
                "{}: listed in workspace, but not in dependencies. Ignoring.",
                name
            );
            continue;
        };
        let tag = branch
            .clone()
            .filter(|b| !b.is_empty())
            .or_else(|| dependency.tag().map(str::to_string));
        let refs = CheckoutRefs { tag, rev: None };
        if let Some(checkout) = checkout_dependency(
            git,
            name,
            dependency.url(),
            refs,
            &workspace.workspace.join(name),
            true,
        )? {
            checkouts.push(checkout);
        }
    }
    Ok(checkouts)
}

/// Creates or updates `<workspace>/<workspace name>.code-workspace` so that it
/// lists every checkout as a folder. Existing folders and settings are kept.
pub fn write_vscode_workspace(workspace: &Path, checkouts: &[LocalCheckout]) -> Result<PathBuf> {
    let workspace_name = workspace
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "workspace".to_string());
    let file = workspace.join(format!("{}.code-workspace", workspace_name));

    let mut content = if file.exists() {
        warn!("VS Code workspace file \"{}\" exists.", file.display());
        info!("Updating VS Code workspace file.");
        serde_json::from_str::<serde_json::Value>(&fs::read_to_string(&file)?)?
    } else {
        info!("Creating VS Code workspace file at: {}", file.display());
        serde_json::json!({})
    };

    if !content.is_object() {
        content = serde_json::json!({});
    }
    if !content["folders"].is_array() {
        content["folders"] = serde_json::json!([]);
    }
    if let Some(folders) = content["folders"].as_array_mut() {
        for checkout in checkouts {
            let folder = checkout
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| checkout.name.clone());
            if !folders.iter().any(|f| f["path"] == folder.as_str()) {
                debug!("Dependency \"{}\" added to VS Code workspace file", folder);
                folders.push(serde_json::json!({ "path": folder }));
            }
        }
    }

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    content.serialize(&mut serializer)?;
    write_atomic(&file, &buffer)?;
    Ok(file)
}
