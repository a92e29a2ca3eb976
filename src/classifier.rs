//! Eligibility rules for files and directories.
//!
//! Classification is pure path logic: it never touches the filesystem, so the
//! rules can be exercised against synthetic entries. The walker produces
//! [`Entry`] values and the scan driver asks [`classify`] about each one.

use std::path::{Path, PathBuf};

/// Substring that marks a file or directory as permanently out of scope.
pub const EXCLUSION_MARKER: &str = "_[sys]_";

/// Substring that marks a directory as in scope under [`ScopeRule::ScopeToMarkedDirs`].
pub const SCAN_MARKER: &str = "_[scan]_";

/// Whether an entry is a regular file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A filesystem path seen during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Absolute (root-joined) path of the entry.
    pub path: PathBuf,
    /// File or directory.
    pub kind: EntryKind,
}

impl Entry {
    /// Creates a file entry.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    /// Creates a directory entry.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Which directories take part in a scan.
///
/// Exactly one rule is bound per scan invocation. Files are additionally
/// excluded under every rule when their path carries [`EXCLUSION_MARKER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeRule {
    /// Every directory except those whose path contains the exclusion marker.
    ExcludeMarked,
    /// Only directories whose own name contains the scan marker.
    ///
    /// Eligibility is checked per directory and is not inherited: an unmarked
    /// child of a marked directory is skipped.
    ScopeToMarkedDirs,
    /// Only directories whose path equals `root.join(item)` for an item of the list.
    ScopeToExplicitList(Vec<PathBuf>),
}

impl ScopeRule {
    /// Short name used in logs and console output.
    pub fn name(&self) -> &'static str {
        match self {
            ScopeRule::ExcludeMarked => "exclude-marked",
            ScopeRule::ScopeToMarkedDirs => "marked-dirs",
            ScopeRule::ScopeToExplicitList(_) => "listed-dirs",
        }
    }
}

/// Why an entry was included or excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The entry takes part in the scan.
    Eligible,
    /// The path carries the exclusion marker.
    ExclusionMarker,
    /// The directory name lacks the scan marker.
    UnmarkedDirectory,
    /// The directory is not in the allow-list.
    NotListed,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Reason::Eligible => "eligible",
            Reason::ExclusionMarker => "path contains the system marker",
            Reason::UnmarkedDirectory => "directory is not marked for scanning",
            Reason::NotListed => "directory is not in the allow-list",
        };
        f.write_str(text)
    }
}

/// Result of classifying one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub include: bool,
    pub reason: Reason,
}

impl From<Reason> for Classification {
    fn from(reason: Reason) -> Self {
        Self {
            include: reason == Reason::Eligible,
            reason,
        }
    }
}

/// Returns true if the part of `path` below `root` contains the exclusion marker.
///
/// Only the root-relative portion is inspected, so a root that itself lives
/// under a marked directory can still be organized.
pub fn has_exclusion_marker(path: &Path, root: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.to_string_lossy().contains(EXCLUSION_MARKER)
}

/// Classifies an entry under the given rule.
///
/// A directory is judged by the rule alone. A file is excluded when its own
/// path carries the exclusion marker, and otherwise inherits the verdict of
/// its parent directory.
pub fn classify(entry: &Entry, rule: &ScopeRule, root: &Path) -> Classification {
    match entry.kind {
        EntryKind::Directory => directory_reason(&entry.path, rule, root).into(),
        EntryKind::File => {
            if has_exclusion_marker(&entry.path, root) {
                return Reason::ExclusionMarker.into();
            }
            let parent = entry.path.parent().unwrap_or(root);
            directory_reason(parent, rule, root).into()
        }
    }
}

fn directory_reason(dir: &Path, rule: &ScopeRule, root: &Path) -> Reason {
    match rule {
        ScopeRule::ExcludeMarked => {
            if has_exclusion_marker(dir, root) {
                Reason::ExclusionMarker
            } else {
                Reason::Eligible
            }
        }
        ScopeRule::ScopeToMarkedDirs => {
            let marked = dir
                .file_name()
                .is_some_and(|name| name.to_string_lossy().contains(SCAN_MARKER));
            if marked {
                Reason::Eligible
            } else {
                Reason::UnmarkedDirectory
            }
        }
        ScopeRule::ScopeToExplicitList(allow_list) => {
            if allow_list.iter().any(|item| root.join(item) == dir) {
                Reason::Eligible
            } else {
                Reason::NotListed
            }
        }
    }
}
