//! datetidy - reversible date-and-extension organization of a directory tree
//!
//! Files under a root are moved to `root/YYYY/MM/EXT/name` according to their
//! modification time and extension. Every move of a run is recorded in a CSV
//! manifest inside the root's `_[sys]_old_structure` directory, and a manifest
//! can be replayed backwards to restore the previous layout.

pub mod bootstrap;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod destination;
pub mod file_organizer;
pub mod logging;
pub mod manifest;
pub mod output;
pub mod scan;
pub mod undo;
pub mod walker;

pub use bootstrap::{BootstrapError, Instructions};
pub use classifier::{Classification, Entry, EntryKind, Reason, ScopeRule, classify};
pub use config::{ConfigError, DatetidyConfig};
pub use destination::resolve;
pub use file_organizer::{FileOrganizer, MoveRecord, OrganizeError, OrganizeResult, PathError};
pub use manifest::{ManifestSession, list_manifests};
pub use scan::{ScanReport, Scanner, scan_exclude_marked, scan_explicit_dirs, scan_marked_dirs_only};
pub use undo::{UndoManager, UndoReport};

pub use cli::{OrganizeCommand, run_cli};

/// Reverts the scan recorded in `manifest_name` under `root`.
///
/// Shorthand for [`UndoManager::revert`].
pub fn revert(root: &std::path::Path, manifest_name: &str) -> OrganizeResult<UndoReport> {
    UndoManager::revert(root, manifest_name)
}
