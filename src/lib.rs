//! # edm
//!
//! Library behind the `edm` command-line tool, which assembles and inspects
//! multi-repository workspaces of the EVerest charging stack.
//!
//! ## Quick Example
//!
//! ```
//! use std::path::Path;
//! use edm::manifest::parse_dependencies;
//! use edm::modify::modify_urls;
//!
//! let yaml = r#"
//! libocpp:
//!   git: https://github.com/EVerest/libocpp.git
//!   git_tag: v0.16.0
//! "#;
//! let mut deps = parse_dependencies(yaml, Path::new("dependencies.yaml")).unwrap();
//! modify_urls(
//!     &mut deps,
//!     "prefix=https://github.com/ replace=git@github.com:",
//! )
//! .unwrap();
//! assert_eq!(
//!     deps["libocpp"].git.as_deref(),
//!     Some("git@github.com:EVerest/libocpp.git")
//! );
//! ```
//!
//! ## Core Concepts
//!
//! - **Manifests (`manifest`, `modify`)**: every repository may carry a
//!   `dependencies.yaml` naming the repositories it needs. Manifests are
//!   merged into one dependency map and can be rewritten by the user.
//! - **Repositories (`git`, `repository`, `resolve`)**: a thin driver over the
//!   `git` executable behind the mockable [`repository::GitOperations`] trait,
//!   plus the resolver that turns branch names into concrete revisions.
//! - **Workspaces (`workspace`, `assemble`, `snapshot`)**: dependencies are
//!   materialized as `<workspace>/<name>` checkouts. The assembler repeats
//!   scan, materialize and snapshot until the snapshot no longer changes.
//! - **Outputs (`config`, `cmake`, `report`, `release`)**: workspace configs
//!   and snapshots as YAML, a CPM include file for CMake, human-readable git
//!   reports and JSON release manifests.

pub mod assemble;
pub mod cmake;
pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod manifest;
pub mod modify;
pub mod output;
pub mod release;
pub mod report;
pub mod repository;
pub mod resolve;
pub mod settings;
pub mod snapshot;
pub mod workspace;
