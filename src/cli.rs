//! Command-line front end for datetidy.
//!
//! Turns a parsed command plus an established root into calls on the scan
//! driver and the reversal engine, and prints the outcome.

use crate::classifier::ScopeRule;
use crate::file_organizer::OrganizeError;
use crate::manifest::list_manifests;
use crate::output::OutputFormatter;
use crate::scan::{ScanPlan, ScanReport, Scanner};
use crate::undo::{UndoManager, UndoReport};
use clap::ValueEnum;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Which directories an `organize` run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Policy {
    /// Everything except paths containing `_[sys]_`.
    ExcludeMarked,
    /// Only directories whose name contains `_[scan]_`.
    MarkedDirs,
    /// Only directories listed in the instructions file.
    ListedDirs,
}

impl Policy {
    /// The scope rule this policy binds, given the instructions allow-list.
    pub fn scope_rule(self, allow_list: &[PathBuf]) -> ScopeRule {
        match self {
            Policy::ExcludeMarked => ScopeRule::ExcludeMarked,
            Policy::MarkedDirs => ScopeRule::ScopeToMarkedDirs,
            Policy::ListedDirs => ScopeRule::ScopeToExplicitList(allow_list.to_vec()),
        }
    }
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizeCommand {
    /// Organize files under the root.
    Organize {
        policy: Policy,
        /// If true, only show what would happen.
        dry_run: bool,
    },
    /// Revert the scan recorded in the named manifest.
    Revert { manifest: String },
    /// List the manifests available for revert.
    List,
}

/// Where a command operates and how chatty it is.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub root: PathBuf,
    /// Root-relative directories for [`Policy::ListedDirs`].
    pub allow_list: Vec<PathBuf>,
    /// Show a progress bar while moving.
    pub progress: bool,
}

impl RunContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            allow_list: Vec::new(),
            progress: false,
        }
    }
}

/// Runs one command.
///
/// # Examples
///
/// ```no_run
/// use datetidy::cli::{run_cli, OrganizeCommand, Policy, RunContext};
///
/// let command = OrganizeCommand::Organize { policy: Policy::ExcludeMarked, dry_run: true };
/// if let Err(e) = run_cli(&command, &RunContext::new("/path/to/root")) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(command: &OrganizeCommand, context: &RunContext) -> Result<(), String> {
    match command {
        OrganizeCommand::Organize { policy, dry_run } => {
            let rule = policy.scope_rule(&context.allow_list);
            if *policy == Policy::ListedDirs && context.allow_list.is_empty() {
                OutputFormatter::warning("The allow-list is empty; nothing will be organized.");
            }
            if *dry_run {
                organize_dry_run(&context.root, rule)
            } else {
                organize(&context.root, rule, context.progress)
            }
        }
        OrganizeCommand::Revert { manifest } => revert(&context.root, manifest),
        OrganizeCommand::List => list(&context.root),
    }
}

fn organize(root: &Path, rule: ScopeRule, progress: bool) -> Result<(), String> {
    let scanner = Scanner::new(root, rule).map_err(|e| e.to_string())?;
    OutputFormatter::info(&format!(
        "Organizing {} ({})",
        scanner.root().display(),
        scanner.rule().name()
    ));

    let plan = scanner.plan();
    report_plan_errors(&plan);

    let pb = progress.then(|| OutputFormatter::create_progress_bar(plan.moves.len() as u64));
    let report = scanner
        .execute(plan, |planned, result| {
            if let Some(pb) = &pb {
                pb.inc(1);
                if let Some(name) = planned.source.file_name() {
                    pb.set_message(name.to_string_lossy().into_owned());
                }
            }
            if let Err(e) = result {
                let line = format!("{}", e);
                match &pb {
                    Some(pb) => pb.suspend(|| OutputFormatter::error(&line)),
                    None => OutputFormatter::error(&line),
                }
            }
        })
        .map_err(|e| {
            if let Some(pb) = &pb {
                pb.abandon();
            }
            execute_failure_message(&e)
        })?;
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    print_scan_report(&report);
    Ok(())
}

fn organize_dry_run(root: &Path, rule: ScopeRule) -> Result<(), String> {
    let scanner = Scanner::new(root, rule).map_err(|e| e.to_string())?;
    OutputFormatter::dry_run_notice(&format!(
        "Analyzing {} ({})",
        scanner.root().display(),
        scanner.rule().name()
    ));

    let plan = scanner.plan();
    report_plan_errors(&plan);

    if plan.moves.is_empty() {
        OutputFormatter::plain("No files found to organize.");
        return Ok(());
    }

    let mut counts = BTreeMap::new();
    for planned in &plan.moves {
        OutputFormatter::plain(&format!(
            " - {} → {}",
            relative(scanner.root(), &planned.source).display(),
            relative(scanner.root(), &planned.destination).display()
        ));
        *counts.entry(bucket_of(&planned.destination)).or_insert(0) += 1;
    }
    OutputFormatter::summary_table(&counts, plan.moves.len());
    OutputFormatter::dry_run_notice("No files were modified.");
    Ok(())
}

fn revert(root: &Path, manifest: &str) -> Result<(), String> {
    OutputFormatter::info(&format!("Reverting {} using {}", root.display(), manifest));
    let report = UndoManager::revert(root, manifest).map_err(|e| e.to_string())?;
    print_undo_report(&report);
    Ok(())
}

fn list(root: &Path) -> Result<(), String> {
    let manifests = list_manifests(root).map_err(|e| e.to_string())?;
    if manifests.is_empty() {
        OutputFormatter::warning("No manifests found.");
        return Ok(());
    }

    OutputFormatter::header("Available manifests:");
    for (i, name) in manifests.iter().enumerate() {
        OutputFormatter::plain(&format!("{}. {}", i + 1, name));
    }
    Ok(())
}

/// Explains what a failed run left behind.
///
/// The manifest is only written after the moves, so a write failure means
/// moved files may be missing from it. Any other failure happens before the
/// first move.
fn execute_failure_message(error: &OrganizeError) -> String {
    match error {
        OrganizeError::ManifestWriteFailed { path, .. } => format!(
            "{}. Files moved in this run may be missing from {}; check it before reverting.",
            error,
            path.display()
        ),
        _ => format!("{}. No files were moved.", error),
    }
}

fn report_plan_errors(plan: &ScanPlan) {
    for error in &plan.errors {
        OutputFormatter::warning(&format!("Skipped {}", error));
    }
}

fn print_scan_report(report: &ScanReport) {
    if report.moved.is_empty() {
        OutputFormatter::plain("No files were moved.");
    } else {
        let mut counts = BTreeMap::new();
        for record in &report.moved {
            *counts.entry(bucket_of(&record.new_path)).or_insert(0) += 1;
        }
        OutputFormatter::summary_table(&counts, report.moved.len());
    }

    if !report.already_in_place.is_empty() {
        OutputFormatter::plain(&format!(
            "Already organized: {}",
            report.already_in_place.len()
        ));
    }
    if !report.failed.is_empty() {
        OutputFormatter::warning(&format!(
            "{} files could not be moved and were left in place.",
            report.failed.len()
        ));
    }
    OutputFormatter::success(&format!(
        "Manifest saved as {}",
        report.manifest_path.display()
    ));
}

fn print_undo_report(report: &UndoReport) {
    OutputFormatter::success(&format!("Restored: {}", report.restored));

    if !report.missing.is_empty() {
        OutputFormatter::plain(&format!(
            "Already restored or missing: {}",
            report.missing.len()
        ));
    }
    for row in &report.skipped_rows {
        OutputFormatter::warning(&format!("Skipped manifest {}", row));
    }
    for error in &report.errors {
        OutputFormatter::error(&error.to_string());
    }
    if !report.pruned_dirs.is_empty() {
        OutputFormatter::plain(&format!(
            "Removed {} empty directories",
            report.pruned_dirs.len()
        ));
    }
}

/// The extension folder a destination path sits in.
fn bucket_of(destination: &Path) -> String {
    destination
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn relative<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
