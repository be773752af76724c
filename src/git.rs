//! # Git Driver
//!
//! A narrow adapter over the system `git` executable. Using the binary rather
//! than a library means that SSH keys, credential helpers and anything else
//! configured in `~/.gitconfig` work exactly as they do on the command line.
//!
//! Observations (`is_dirty`, `current_branch`, ...) and remote queries
//! (`remote_tags`, `is_tag`, ...) never fail: a non-zero exit becomes a
//! sentinel value. Only `clone` and `remote_rev` return typed errors, because
//! their callers need to know *why* nothing came back.

use std::path::Path;
use std::process::{Command, Output};

use log::{debug, error, info, warn};
use semver::Version;

use crate::error::{Error, Result};

/// Exit code of `git ls-remote --exit-code` when no matching ref exists.
const LS_REMOTE_NOT_FOUND: i32 = 2;

fn run(dir: Option<&Path>, args: &[&str]) -> std::io::Result<Output> {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.arg("-C").arg(dir);
    }
    cmd.args(args).output()
}

/// Runs git in `dir` and returns trimmed stdout if the command succeeded.
fn stdout_of(dir: &Path, args: &[&str]) -> Option<String> {
    match run(Some(dir), args) {
        Ok(output) if output.status.success() => Some(
            String::from_utf8_lossy(&output.stdout)
                .trim_end_matches(['\n', '\r'])
                .to_string(),
        ),
        Ok(_) => None,
        Err(e) => {
            error!("Could not run git in {}: {}", dir.display(), e);
            None
        }
    }
}

fn succeeds(dir: &Path, args: &[&str]) -> bool {
    run(Some(dir), args)
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Returns true if `path` is the top level of a git working tree.
///
/// A subdirectory of some other repository is not a repo in this sense, nor
/// is a linked worktree whose git dir lives elsewhere.
pub fn is_repo(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    stdout_of(path, &["rev-parse", "--git-dir"]).as_deref() == Some(".git")
}

/// Returns true if the working tree or the index differ from HEAD.
/// Untracked files are ignored.
pub fn is_dirty(path: &Path) -> bool {
    !succeeds(path, &["diff", "--quiet", "--exit-code"])
        || !succeeds(path, &["diff", "--cached", "--quiet", "--exit-code"])
}

pub fn is_detached(path: &Path) -> bool {
    !succeeds(path, &["symbolic-ref", "-q", "HEAD"])
}

/// Full commit hash of HEAD.
pub fn current_rev(path: &Path) -> Option<String> {
    non_empty(stdout_of(path, &["rev-parse", "HEAD"]))
}

/// Abbreviated commit hash of HEAD.
pub fn current_short_rev(path: &Path) -> Option<String> {
    non_empty(stdout_of(path, &["rev-parse", "--short", "HEAD"]))
}

/// Name of the checked out branch, `None` when HEAD is detached.
pub fn current_branch(path: &Path) -> Option<String> {
    non_empty(stdout_of(path, &["symbolic-ref", "--short", "-q", "HEAD"]))
}

/// Tag pointing exactly at HEAD, if any.
pub fn current_tag(path: &Path) -> Option<String> {
    non_empty(stdout_of(path, &["describe", "--exact-match", "--tags"]))
}

pub fn remote_url(path: &Path) -> Option<String> {
    non_empty(stdout_of(path, &["config", "--get", "remote.origin.url"]))
}

/// Upstream tracking branch of the current branch, e.g. `origin/main`.
pub fn upstream_branch(path: &Path) -> Option<String> {
    non_empty(stdout_of(
        path,
        &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
    ))
}

/// Commits `(ahead, behind)` of the upstream tracking branch.
pub fn ahead_behind(path: &Path) -> Option<(u32, u32)> {
    stdout_of(path, &["rev-list", "--left-right", "--count", "HEAD...@{u}"])
        .and_then(|out| parse_ahead_behind(&out))
}

fn parse_ahead_behind(output: &str) -> Option<(u32, u32)> {
    let mut parts = output.split_whitespace();
    let ahead = parts.next()?.parse().ok()?;
    let behind = parts.next()?.parse().ok()?;
    Some((ahead, behind))
}

/// Remote branches that contain HEAD, without the `origin/` prefix and
/// without the symbolic `HEAD` pointer.
pub fn infer_branches(path: &Path) -> Vec<String> {
    stdout_of(
        path,
        &[
            "branch",
            "--format=%(refname:lstrip=0)",
            "--remotes",
            "--no-abbrev",
            "--contains",
        ],
    )
    .map(|out| parse_remote_branches(&out))
    .unwrap_or_default()
}

fn parse_remote_branches(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim().trim_matches('"'))
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.strip_prefix("refs/remotes/origin/")
                .unwrap_or(line)
                .to_string()
        })
        .filter(|branch| branch != "HEAD")
        .collect()
}

pub fn fetch(path: &Path) -> bool {
    debug!(
        "\"{}\": fetching information from remote",
        display_name(path)
    );
    match run(Some(path), &["fetch"]) {
        Ok(output) if output.status.success() => true,
        Ok(output) => {
            error!(
                "\"{}\" Error during git-fetch: {}",
                display_name(path),
                output.status.code().unwrap_or(-1)
            );
            false
        }
        Err(e) => {
            error!("\"{}\" Could not run git-fetch: {}", display_name(path), e);
            false
        }
    }
}

pub fn pull(path: &Path) -> bool {
    info!("\"{}\": pulling from remote", display_name(path));
    match run(Some(path), &["pull"]) {
        Ok(output) if output.status.success() => true,
        Ok(output) => {
            error!(
                "\"{}\" Error during git-pull: {}\n{}",
                display_name(path),
                output.status.code().unwrap_or(-1),
                indent(&String::from_utf8_lossy(&output.stderr), 4)
            );
            false
        }
        Err(e) => {
            error!("\"{}\" Could not run git-pull: {}", display_name(path), e);
            false
        }
    }
}

/// Checks out `rev` in `path`. Output is logged at debug level either way.
pub fn checkout(path: &Path, rev: &str) -> bool {
    match run(Some(path), &["checkout", rev]) {
        Ok(output) => {
            debug!("{}", indent(&String::from_utf8_lossy(&output.stdout), 4));
            debug!("{}", indent(&String::from_utf8_lossy(&output.stderr), 4));
            output.status.success()
        }
        Err(e) => {
            error!("Could not run git-checkout in {}: {}", path.display(), e);
            false
        }
    }
}

/// Clones `url` into `dest`, optionally at `branch` (which may also be a tag).
///
/// Failure is reported as [`Error::LocalCheckout`] so that the materializer
/// can retry under a different interpretation of the ref.
pub fn clone(url: &str, dest: &Path, branch: Option<&str>) -> Result<()> {
    let dest_str = dest.to_string_lossy();
    let mut args = vec!["clone"];
    match branch {
        Some(branch) => args.extend(["--branch", branch]),
        None => debug!("  No git-tag specified, cloning default branch."),
    }
    args.extend([url, &*dest_str]);

    let checkout_error = |message: String| Error::LocalCheckout {
        name: display_name(dest),
        url: url.to_string(),
        r#ref: branch.unwrap_or_default().to_string(),
        message,
    };

    let output = run(None, &args).map_err(|e| checkout_error(e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!("   Error while cloning git repository during local dependency checkout:");
        warn!("{}", indent(&stderr, 6));

        let message = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            format!(
                "Authentication failed. Make sure you have access to the repository.\n\
                Error: {}",
                stderr
            )
        } else {
            stderr
        };
        return Err(checkout_error(message));
    }
    debug!("{}", indent(&String::from_utf8_lossy(&output.stderr), 4));
    Ok(())
}

/// Tags of a remote repository, newest version first.
pub fn remote_tags(url: &str) -> Vec<String> {
    let output = run(
        None,
        &[
            "-c",
            "versionsort.suffix=-",
            "ls-remote",
            "--tags",
            "--sort=-v:refname",
            "--refs",
            "--quiet",
            url,
        ],
    );
    match output {
        Ok(output) if output.status.success() => {
            parse_ls_remote_refs(&String::from_utf8_lossy(&output.stdout), "refs/tags/")
        }
        _ => Vec::new(),
    }
}

/// Branch names of a remote repository.
pub fn remote_branches(url: &str) -> Vec<String> {
    match run(None, &["ls-remote", "--heads", "--quiet", url]) {
        Ok(output) if output.status.success() => {
            parse_ls_remote_refs(&String::from_utf8_lossy(&output.stdout), "refs/heads/")
        }
        _ => Vec::new(),
    }
}

/// Extracts ref names from `<hash>\t<ref>` lines, stripping `prefix`.
fn parse_ls_remote_refs(output: &str, prefix: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(_, name)| name.strip_prefix(prefix).unwrap_or(name).to_string())
        .collect()
}

/// Returns false only when the remote definitively has no tag `name`.
///
/// Any failure other than "not found" (network, auth) is treated as "might be
/// a tag", which leaves the caller's value untouched.
pub fn is_tag(url: &str, name: &str) -> bool {
    let tag_ref = format!("refs/tags/{}", name);
    match run(None, &["ls-remote", "--exit-code", url, &tag_ref]) {
        Ok(output) => output.status.code() != Some(LS_REMOTE_NOT_FOUND),
        Err(e) => {
            warn!("Could not query {} for tag {}: {}", url, name, e);
            true
        }
    }
}

/// Resolves `reference` on the remote at `url` to a commit hash.
pub fn remote_rev(url: &str, reference: &str) -> Result<String> {
    let remote_error = |message: String| Error::RemoteRef {
        url: url.to_string(),
        r#ref: reference.to_string(),
        message,
    };
    let output = run(None, &["ls-remote", "--exit-code", url, reference])
        .map_err(|e| remote_error(e.to_string()))?;
    if !output.status.success() {
        let message = if output.status.code() == Some(LS_REMOTE_NOT_FOUND) {
            "ref not found on remote".to_string()
        } else {
            String::from_utf8_lossy(&output.stderr).trim().to_string()
        };
        return Err(remote_error(message));
    }
    select_ls_remote_rev(&String::from_utf8_lossy(&output.stdout), reference)
        .ok_or_else(|| remote_error("no ref with exactly this name on remote".to_string()))
}

/// Picks the hash of `reference` from `ls-remote` output.
///
/// `ls-remote` matches patterns by trailing path components, so `main` also
/// lists `refs/heads/dev/main`. Only an exact ref name is accepted: the name
/// itself (e.g. `HEAD` or a full `refs/...` name), then the branch, then the
/// tag. Annotated tags resolve to their peeled commit.
fn select_ls_remote_rev(output: &str, reference: &str) -> Option<String> {
    let refs: Vec<(&str, &str)> = output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .collect();
    let lookup = |name: &str| {
        refs.iter()
            .find(|(_, r)| *r == name)
            .map(|(hash, _)| hash.to_string())
    };
    let peeled = |name: &str| lookup(&format!("{}^{{}}", name)).or_else(|| lookup(name));

    if reference.starts_with("refs/") || reference == "HEAD" {
        return peeled(reference);
    }
    lookup(&format!("refs/heads/{}", reference))
        .or_else(|| peeled(&format!("refs/tags/{}", reference)))
}

/// Returns true if an SSH key is registered for `git@github.com`.
///
/// GitHub closes authenticated `ssh -T` sessions with exit code 1.
pub fn has_github_ssh_key() -> bool {
    Command::new("ssh")
        .args(["-o", "BatchMode=yes", "-T", "git@github.com"])
        .output()
        .map(|output| output.status.code() == Some(1))
        .unwrap_or(false)
}

/// Parse a tag string into a semantic version
pub fn parse_semver_tag(tag: &str) -> Option<Version> {
    let version_str = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(version_str).ok()
}

/// Picks the newest stable release from tags sorted newest first.
///
/// Falls back to the first tag when none parses as a stable semver version.
pub fn latest_release(tags: &[String]) -> Option<&String> {
    tags.iter()
        .filter(|tag| parse_semver_tag(tag).is_some_and(|v| v.pre.is_empty()))
        .max_by(|a, b| parse_semver_tag(a).cmp(&parse_semver_tag(b)))
        .or_else(|| tags.first())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn indent(text: &str, width: usize) -> String {
    let space = " ".repeat(width);
    text.lines()
        .filter(|line| !line.is_empty())
        .map(|line| format!("{}{}", space, line))
        .collect::<Vec<_>>()
        .join("\n")
}
