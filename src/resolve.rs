//! Remote ref resolution.
//!
//! A dependency's `git_tag` may name a branch, a tag or a revision. The build
//! system downstream cannot tell these apart, so before emitting it every
//! non-local entry whose `git_tag` is not a tag on its remote gets the value
//! replaced by the concrete commit the remote currently points at.
//!
//! Queries run on the rayon pool; each entry is independent and the results
//! are applied once all workers have joined.

use std::collections::HashSet;
use std::fmt;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::manifest::Dependencies;
use crate::repository::GitOperations;

/// Branch names that are never treated as tags.
pub const KNOWN_BRANCHES: [&str; 2] = ["main", "master"];

/// What a `git_tag` value turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    Branch(String),
    Tag(String),
    /// A full commit hash.
    Rev(String),
    /// Not yet classified.
    Unknown(String),
}

impl GitRef {
    /// Classifies `value` without talking to any remote.
    pub fn from_value(value: &str) -> Self {
        if is_full_hash(value) {
            GitRef::Rev(value.to_string())
        } else if KNOWN_BRANCHES.contains(&value) {
            GitRef::Branch(value.to_string())
        } else {
            GitRef::Unknown(value.to_string())
        }
    }

    /// Classifies `value`, asking `url` whether it is a tag when the value
    /// alone does not tell.
    pub fn classify(git: &dyn GitOperations, url: &str, value: &str) -> Self {
        match Self::from_value(value) {
            GitRef::Unknown(value) if git.is_tag(url, &value) => GitRef::Tag(value),
            GitRef::Unknown(value) => GitRef::Branch(value),
            known => known,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GitRef::Branch(s) | GitRef::Tag(s) | GitRef::Rev(s) | GitRef::Unknown(s) => s,
        }
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true for a 40 (SHA-1) or 64 (SHA-256) character hex string.
pub fn is_full_hash(value: &str) -> bool {
    matches!(value.len(), 40 | 64) && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Replaces branch-like `git_tag` values of non-local dependencies by the
/// revision their remote reports.
///
/// Entries without a URL or `git_tag`, and entries named in `local`, are left
/// alone. A ref the remote cannot resolve keeps its value and is logged.
pub fn resolve_remote_refs(
    dependencies: &mut Dependencies,
    local: &HashSet<String>,
    git: &dyn GitOperations,
) {
    let candidates: Vec<(String, String, String)> = dependencies
        .iter()
        .filter(|(name, _)| {
            let is_local = local.contains(*name);
            if is_local {
                debug!("Skipping remote resolution of local dependency \"{}\"", name);
            }
            !is_local
        })
        .filter_map(|(name, entry)| {
            let url = entry.url()?;
            let tag = entry.tag()?;
            Some((name.clone(), url.to_string(), tag.to_string()))
        })
        .collect();

    let resolved: Vec<(String, Option<String>)> = candidates
        .par_iter()
        .map(|(name, url, tag)| (name.clone(), resolve_one(git, name, url, tag)))
        .collect();

    for (name, rev) in resolved {
        if let (Some(rev), Some(entry)) = (rev, dependencies.get_mut(&name)) {
            entry.git_tag = Some(rev);
        }
    }
}

fn resolve_one(git: &dyn GitOperations, name: &str, url: &str, tag: &str) -> Option<String> {
    match GitRef::classify(git, url, tag) {
        GitRef::Tag(_) | GitRef::Rev(_) => None,
        reference => match git.remote_rev(url, reference.as_str()) {
            Ok(rev) => {
                info!(
                    "Dependency \"{}\": determined git ref \"{}\" of branch \"{}\"",
                    name, rev, reference
                );
                Some(rev)
            }
            Err(e) => {
                warn!("Dependency \"{}\": keeping \"{}\": {}", name, reference, e);
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Dependency;
    use crate::repository::mock::MockGitOperations;

    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

    fn entry(url: &str, tag: &str) -> Dependency {
        Dependency {
            git: Some(url.into()),
            git_tag: Some(tag.into()),
            ..Dependency::default()
        }
    }

    #[test]
    fn test_from_value() {
        assert_eq!(GitRef::from_value(SHA), GitRef::Rev(SHA.into()));
        assert_eq!(GitRef::from_value("main"), GitRef::Branch("main".into()));
        assert_eq!(GitRef::from_value("master"), GitRef::Branch("master".into()));
        assert_eq!(GitRef::from_value("v1.0"), GitRef::Unknown("v1.0".into()));
        assert_eq!(GitRef::from_value("abc1234"), GitRef::Unknown("abc1234".into()));
    }

    #[test]
    fn test_classify_asks_remote_only_when_needed() {
        let mut git = MockGitOperations::new();
        git.remote_tags.insert("u".into(), vec!["v1.0".into()]);
        assert_eq!(GitRef::classify(&git, "u", "v1.0"), GitRef::Tag("v1.0".into()));
        assert_eq!(
            GitRef::classify(&git, "u", "feature/x"),
            GitRef::Branch("feature/x".into())
        );
        assert_eq!(GitRef::classify(&git, "u", "main"), GitRef::Branch("main".into()));
        assert_eq!(
            git.calls(),
            vec!["is_tag u v1.0".to_string(), "is_tag u feature/x".to_string()]
        );
    }

    #[test]
    fn test_resolve_replaces_branches_only() {
        let mut git = MockGitOperations::new()
            .with_remote_rev("https://h/a.git", "main", "aaaa")
            .with_remote_rev("https://h/c.git", "dev", "cccc");
        git.remote_tags
            .insert("https://h/b.git".into(), vec!["v1.0".into()]);

        let mut deps = Dependencies::new();
        deps.insert("a".into(), entry("https://h/a.git", "main"));
        deps.insert("b".into(), entry("https://h/b.git", "v1.0"));
        deps.insert("c".into(), entry("https://h/c.git", "dev"));
        deps.insert("d".into(), entry("https://h/d.git", SHA));
        deps.insert("local".into(), entry("https://h/l.git", "main"));
        deps.insert("no-url".into(), Dependency {
            git_tag: Some("main".into()),
            ..Dependency::default()
        });

        let local: HashSet<String> = ["local".to_string()].into_iter().collect();
        resolve_remote_refs(&mut deps, &local, &git);

        assert_eq!(deps["a"].tag(), Some("aaaa"));
        assert_eq!(deps["b"].tag(), Some("v1.0"));
        assert_eq!(deps["c"].tag(), Some("cccc"));
        assert_eq!(deps["d"].tag(), Some(SHA));
        assert_eq!(deps["local"].tag(), Some("main"));
        assert_eq!(deps["no-url"].tag(), Some("main"));
        assert!(!git.calls().iter().any(|c| c.contains("l.git")));
    }

    #[test]
    fn test_unresolvable_ref_keeps_value() {
        let git = MockGitOperations::new();
        let mut deps = Dependencies::new();
        deps.insert("a".into(), entry("https://h/a.git", "abc1234"));
        resolve_remote_refs(&mut deps, &HashSet::new(), &git);
        assert_eq!(deps["a"].tag(), Some("abc1234"));
    }
}
