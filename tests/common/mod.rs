//! Git fixtures shared by the integration tests.
//!
//! Remotes are ordinary repositories in a temp directory, addressed with
//! `file://` URLs, so no test touches the network.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::Command;

/// Runs git in `dir` and returns its trimmed stdout. Panics on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git must be installed");
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Creates a repository with `main` as default branch and one commit holding
/// `files`.
pub fn init_repo(dir: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "-b", "main"]);
    configure_user(dir);
    commit_files(dir, files, "Initial commit");
}

/// Sets a commit identity and disables signing.
pub fn configure_user(dir: &Path) {
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test User"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Writes `files` and commits them. Returns the new HEAD.
pub fn commit_files(dir: &Path, files: &[(&str, &str)], message: &str) -> String {
    for (path, content) in files {
        let file = dir.join(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(file, content).unwrap();
    }
    git(dir, &["add", "."]);
    git(dir, &["commit", "--allow-empty", "-m", message]);
    head(dir)
}

pub fn head(dir: &Path) -> String {
    git(dir, &["rev-parse", "HEAD"])
}

pub fn tag(dir: &Path, name: &str) {
    git(dir, &["tag", name]);
}

/// Tags a commit that no branch contains. Returns its hash.
pub fn dangling_tag(dir: &Path, name: &str) -> String {
    git(dir, &["checkout", "-q", "-b", "tmp-tag-branch"]);
    let rev = commit_files(dir, &[("RELEASE", name)], name);
    tag(dir, name);
    git(dir, &["checkout", "-q", "main"]);
    git(dir, &["branch", "-q", "-D", "tmp-tag-branch"]);
    rev
}

pub fn file_url(dir: &Path) -> String {
    format!("file://{}", dir.display())
}
