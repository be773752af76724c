//! # Recursive Workspace Assembly
//!
//! Dependencies only become visible once the repository declaring them is on
//! disk, so a workspace is assembled in rounds:
//!
//! 1. Scan the workspace for manifests that have not been read yet and merge
//!    the newly named entries into the config. Entries already present are
//!    never overwritten.
//! 2. Materialize the entries that are not in the workspace yet.
//! 3. Persist the config and take a snapshot.
//!
//! The loop stops as soon as a snapshot equals the previous one. Snapshots
//! (pinned revisions) are compared rather than configs, so cosmetic changes
//! to a config cannot keep the loop alive. The first round only materializes
//! the starting config and never converges on its own.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::write_config;
use crate::error::Result;
use crate::manifest::{
    add_workspace_repos, config_from_dependencies, scan_dependencies, Dependencies, RemoteFilter,
};
use crate::modify::UrlRewrite;
use crate::repository::GitOperations;
use crate::snapshot::create_snapshot;
use crate::workspace::{checkout_dependency, CheckoutRefs};

/// Default bound on assembly rounds.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Knobs for [`Assembler`].
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Also read manifests below `_deps` directories.
    pub include_deps: bool,
    /// Which remotes may enter the config.
    pub filter: RemoteFilter,
    /// Rewrite applied to the URL of every newly merged entry, e.g. to switch
    /// to an authenticated transport.
    pub preferred_transport: Option<UrlRewrite>,
    /// Clone missing entries of the starting config in the first round.
    pub materialize_initial: bool,
    /// Where the config is persisted after every round.
    pub config_path: Option<PathBuf>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            include_deps: false,
            filter: RemoteFilter::default(),
            preferred_transport: None,
            materialize_initial: true,
            config_path: None,
        }
    }
}

/// Outcome of [`Assembler::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub config: Dependencies,
    pub snapshot: Dependencies,
    /// Number of rounds performed.
    pub iterations: usize,
    /// Zero-based round whose snapshot equalled its predecessor, if any.
    pub converged_at: Option<usize>,
}

/// Drives the rounds described in the module docs.
pub struct Assembler<'a> {
    git: &'a dyn GitOperations,
    working_dir: PathBuf,
    options: AssembleOptions,
    config: Dependencies,
    scanned: HashSet<PathBuf>,
    materialized: HashSet<String>,
}

impl<'a> Assembler<'a> {
    pub fn new(
        git: &'a dyn GitOperations,
        working_dir: &Path,
        config: Dependencies,
        options: AssembleOptions,
    ) -> Self {
        Self {
            git,
            working_dir: working_dir.to_path_buf(),
            options,
            config,
            scanned: HashSet::new(),
            materialized: HashSet::new(),
        }
    }

    pub fn config(&self) -> &Dependencies {
        &self.config
    }

    /// Merges entries from manifests and repositories that appeared since the
    /// last call. Returns the names that were added.
    pub fn merge_discovered(&mut self) -> Result<Vec<String>> {
        let scan = scan_dependencies(&self.working_dir, self.options.include_deps, &self.scanned);
        self.scanned.extend(scan.files);

        let discovered = config_from_dependencies(&scan.dependencies, &self.options.filter);
        let discovered = add_workspace_repos(
            &self.working_dir,
            discovered,
            &self.options.filter,
            self.git,
        )?;

        let mut added = Vec::new();
        for (name, mut entry) in discovered {
            if self.config.contains_key(&name) {
                continue;
            }
            if let (Some(rewrite), Some(url)) = (&self.options.preferred_transport, entry.url()) {
                if let Some(rewritten) = rewrite.apply(url) {
                    entry.git = Some(rewritten);
                }
            }
            debug!("Discovered dependency \"{}\"", name);
            self.config.insert(name.clone(), entry);
            added.push(name);
        }
        Ok(added)
    }

    /// Materializes every config entry that has not been handled yet.
    pub fn materialize_pending(&mut self) -> Result<()> {
        let pending: Vec<String> = self
            .config
            .keys()
            .filter(|name| !self.materialized.contains(*name))
            .cloned()
            .collect();
        for name in pending {
            if let Some(entry) = self.config.get(&name) {
                checkout_dependency(
                    self.git,
                    &name,
                    entry.url(),
                    CheckoutRefs::of(entry),
                    &self.working_dir.join(&name),
                    false,
                )?;
            }
            self.materialized.insert(name);
        }
        Ok(())
    }

    /// Runs at most `max_iterations` rounds. `on_snapshot` sees every
    /// snapshot as it is taken.
    pub fn run<F>(mut self, max_iterations: usize, mut on_snapshot: F) -> Result<Assembly>
    where
        F: FnMut(usize, &Dependencies) -> Result<()>,
    {
        if !self.options.materialize_initial {
            self.materialized.extend(self.config.keys().cloned());
        }

        let mut previous: Option<Dependencies> = None;
        let mut iterations = 0;
        let mut converged_at = None;

        for i in 0..max_iterations {
            iterations = i + 1;
            if i > 0 {
                if !self.options.materialize_initial && i == 1 {
                    // Entries of the starting config are set up together with
                    // the first discovered ones.
                    self.materialized.clear();
                }
                self.merge_discovered()?;
            }
            self.materialize_pending()?;
            if let Some(path) = &self.options.config_path {
                write_config(&self.config, path, true)?;
            }

            let snapshot = create_snapshot(self.git, &self.working_dir, &self.config)?;
            on_snapshot(i, &snapshot)?;
            if previous.as_ref() == Some(&snapshot) {
                info!(
                    "Stopping recursive workspace setup early after {} loops.",
                    iterations
                );
                converged_at = Some(i);
                break;
            }
            previous = Some(snapshot);
        }

        Ok(Assembly {
            snapshot: previous.unwrap_or_default(),
            config: self.config,
            iterations,
            converged_at,
        })
    }
}
