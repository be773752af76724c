//! Reporter and pull summary against real git repositories.

mod common;

use std::fs;

use assert_fs::TempDir;
use edm::output::OutputConfig;
use edm::report::{collect, dirty_count, format_report, pull_all};
use edm::repository::DefaultGitOperations;

use common::{commit_files, configure_user, file_url, git, head, init_repo};

/// A workspace with `A` one commit behind its remote and `B` dirty.
fn workspace() -> (TempDir, TempDir) {
    let remotes = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    for name in ["A", "B"] {
        let remote = remotes.path().join(name);
        init_repo(&remote, &[("README.md", "initial\n")]);
        git(
            workspace.path(),
            &["clone", "-q", &file_url(&remote), name],
        );
        configure_user(&workspace.path().join(name));
    }
    commit_files(&remotes.path().join("A"), &[("README.md", "upstream\n")], "Upstream");
    fs::write(workspace.path().join("B/README.md"), "local edit\n").unwrap();
    fs::create_dir(workspace.path().join("not-a-repo")).unwrap();
    (remotes, workspace)
}

#[test]
fn test_report_after_fetch() {
    let (_remotes, workspace) = workspace();
    let reports = collect(&DefaultGitOperations, workspace.path(), &[], true).unwrap();
    assert_eq!(dirty_count(&reports), (1, 2));

    let lines = format_report(&reports, &OutputConfig::plain());
    assert_eq!(
        lines,
        vec![
            "\"A\" @ branch: main [remote: origin/main] [behind 1] [clean]".to_string(),
            "\"B\" @ branch: main [remote: origin/main] [dirty]".to_string(),
            "1/2 repositories are dirty.".to_string(),
        ]
    );
}

#[test]
fn test_report_without_fetch_uses_stale_upstream() {
    let (_remotes, workspace) = workspace();
    let reports = collect(
        &DefaultGitOperations,
        workspace.path(),
        &["A".to_string()],
        false,
    )
    .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].state.behind, 0);
    assert_eq!(reports[0].state.fetch_worked, None);
}

#[test]
fn test_pull_brings_repository_up_to_date() {
    let (remotes, workspace) = workspace();
    let reports = pull_all(&DefaultGitOperations, workspace.path(), &["A".to_string()]).unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].pulled);
    assert_eq!(
        head(&workspace.path().join("A")),
        head(&remotes.path().join("A"))
    );
}
