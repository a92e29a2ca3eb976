//! The scan driver: walk, classify, resolve, move, record.
//!
//! A scan runs in two phases. [`Scanner::plan`] walks the root depth-first
//! and resolves a destination for every eligible file without touching
//! anything. [`Scanner::execute`] then opens a manifest session, moves the
//! planned files one at a time, persists the manifest, and prunes source
//! directories the scan left empty. Planning first means directories the scan
//! creates are never walked by the same scan.
//!
//! Failures of single files or directories are logged, reported and skipped;
//! only a problem with the root or the manifest aborts the scan.

use crate::classifier::{ScopeRule, classify};
use crate::destination::{self, resolve};
use crate::file_organizer::{FileOrganizer, MoveRecord, OrganizeError, OrganizeResult, PathError};
use crate::manifest::ManifestSession;
use crate::walker::walk;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One file the scan intends to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub modified_at: DateTime<Local>,
}

/// Everything a scan would do, computed without side effects.
#[derive(Debug, Default)]
pub struct ScanPlan {
    /// Files to move, in traversal order.
    pub moves: Vec<PlannedMove>,
    /// Eligible files that already sit at their destination.
    pub already_in_place: Vec<PathBuf>,
    /// Files skipped by the scope rule or the exclusion marker.
    pub skipped: usize,
    /// Unreadable directories, files whose metadata could not be read, and
    /// paths that cannot be recorded.
    pub errors: Vec<PathError>,
}

/// Outcome of an executed scan.
#[derive(Debug)]
pub struct ScanReport {
    /// Completed moves, in the order they happened.
    pub moved: Vec<MoveRecord>,
    /// Files that could not be moved and were left in place.
    pub failed: Vec<PathError>,
    /// Problems found while planning.
    pub traversal_errors: Vec<PathError>,
    /// Eligible files already at their destination.
    pub already_in_place: Vec<PathBuf>,
    /// Files skipped by the scope rule or the exclusion marker.
    pub skipped: usize,
    /// Where the manifest was written.
    pub manifest_path: PathBuf,
    /// Source directories removed because the scan emptied them.
    pub pruned_dirs: Vec<PathBuf>,
}

impl ScanReport {
    /// True if nothing failed.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.traversal_errors.is_empty()
    }
}

/// Drives one scan of a root under one scope rule.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    rule: ScopeRule,
}

impl Scanner {
    /// Creates a scanner for `root`.
    ///
    /// A relative `root` is resolved against the current directory, so every
    /// path the scan records is absolute.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBasePath` if `root` is not an existing directory.
    pub fn new(root: impl AsRef<Path>, rule: ScopeRule) -> OrganizeResult<Self> {
        let root = FileOrganizer::ensure_root(root.as_ref())?;
        Ok(Self { root, rule })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rule(&self) -> &ScopeRule {
        &self.rule
    }

    /// Walks the root and resolves a destination for every eligible file.
    pub fn plan(&self) -> ScanPlan {
        let mut plan = ScanPlan::default();

        for item in walk(&self.root) {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = %e.path.display(), reason = %e.reason, "skipping unreadable directory");
                    plan.errors.push(e);
                    continue;
                }
            };
            if !entry.is_file() {
                continue;
            }

            let verdict = classify(&entry, &self.rule, &self.root);
            if !verdict.include {
                debug!(path = %entry.path.display(), reason = %verdict.reason, "skipped");
                plan.skipped += 1;
                continue;
            }

            let modified_at = match destination::modified_at(&entry.path) {
                Ok(time) => time,
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "cannot read modification time");
                    plan.errors.push(PathError::new(&entry.path, e.to_string()));
                    continue;
                }
            };

            let target = resolve(&self.root, &entry.path, &modified_at);
            if target == entry.path {
                plan.already_in_place.push(entry.path);
                continue;
            }
            // Manifest rows are UTF-8 text; a move that cannot be written down is not made.
            if entry.path.to_str().is_none() || target.to_str().is_none() {
                warn!(path = %entry.path.display(), "skipping path that is not valid UTF-8");
                plan.errors.push(PathError::new(
                    &entry.path,
                    "path is not valid UTF-8 and cannot be recorded in a manifest",
                ));
                continue;
            }
            plan.moves.push(PlannedMove {
                source: entry.path,
                destination: target,
                modified_at,
            });
        }

        plan
    }

    /// Performs a plan, calling `on_move` after every attempted move.
    ///
    /// # Errors
    ///
    /// Fails if the bookkeeping directory cannot be created or the manifest
    /// cannot be written. In the latter case the files moved so far stay
    /// moved and the failure message names the manifest path.
    pub fn execute<F>(&self, plan: ScanPlan, mut on_move: F) -> OrganizeResult<ScanReport>
    where
        F: FnMut(&PlannedMove, Result<&MoveRecord, &OrganizeError>),
    {
        let mut session = ManifestSession::open(&self.root)?;
        let mut failed = Vec::new();
        let mut emptied_from: Vec<PathBuf> = Vec::new();

        for planned in &plan.moves {
            match FileOrganizer::move_file(
                &planned.source,
                &planned.destination,
                &planned.modified_at,
            ) {
                Ok(record) => {
                    on_move(planned, Ok(&record));
                    if let Some(parent) = planned.source.parent() {
                        emptied_from.push(parent.to_path_buf());
                    }
                    session.record(record);
                }
                Err(e) => {
                    warn!(path = %planned.source.display(), error = %e, "skipping file");
                    on_move(planned, Err(&e));
                    failed.push(PathError::from(&e));
                }
            }
        }

        let manifest_path = session.persist()?;
        let pruned_dirs = FileOrganizer::prune_empty_ancestors(
            &self.root,
            emptied_from.iter().map(PathBuf::as_path),
        );

        info!(
            root = %self.root.display(),
            rule = self.rule.name(),
            moved = session.len(),
            failed = failed.len(),
            "scan complete"
        );

        Ok(ScanReport {
            moved: session.records().to_vec(),
            failed,
            traversal_errors: plan.errors,
            already_in_place: plan.already_in_place,
            skipped: plan.skipped,
            manifest_path,
            pruned_dirs,
        })
    }

    /// Plans and executes a scan.
    pub fn run(&self) -> OrganizeResult<ScanReport> {
        let plan = self.plan();
        self.execute(plan, |_, _| {})
    }
}

/// Organizes every file under `root` except marked ones.
pub fn scan_exclude_marked(root: &Path) -> OrganizeResult<ScanReport> {
    Scanner::new(root, ScopeRule::ExcludeMarked)?.run()
}

/// Organizes only files directly inside directories named with the scan marker.
pub fn scan_marked_dirs_only(root: &Path) -> OrganizeResult<ScanReport> {
    Scanner::new(root, ScopeRule::ScopeToMarkedDirs)?.run()
}

/// Organizes only files directly inside the listed root-relative directories.
pub fn scan_explicit_dirs(root: &Path, allow_list: &[PathBuf]) -> OrganizeResult<ScanReport> {
    Scanner::new(root, ScopeRule::ScopeToExplicitList(allow_list.to_vec()))?.run()
}
