//! Moving files to their destinations and recording what moved.
//!
//! This module owns the crate's error type, the [`MoveRecord`] that every
//! successful move produces, and the [`FileOrganizer`] that performs moves
//! and tidies up directories emptied by them.

use crate::classifier::has_exclusion_marker;
use crate::destination::format_record_time;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A single completed move.
///
/// Records are the only evidence that a move happened; one is produced only
/// after the file has arrived at `new_path`. The serialized column names are
/// fixed so that existing manifests stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Where the file was before the scan.
    #[serde(rename = "file_path")]
    pub original_path: PathBuf,
    /// Where the scan put it.
    pub new_path: PathBuf,
    /// The file's modification time, `YYYY-MM-DD HH:MM:SS`.
    #[serde(rename = "modification_time")]
    pub recorded_at: String,
}

/// A path together with the reason it could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    pub path: PathBuf,
    pub reason: String,
}

impl PathError {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

impl From<&OrganizeError> for PathError {
    fn from(error: &OrganizeError) -> Self {
        let path = match error {
            OrganizeError::SourceMissing { path }
            | OrganizeError::DestinationExists { path }
            | OrganizeError::DirectoryCreationFailed { path, .. }
            | OrganizeError::InvalidBasePath { path, .. }
            | OrganizeError::ManifestMissing { path }
            | OrganizeError::ManifestWriteFailed { path, .. }
            | OrganizeError::ManifestReadFailed { path, .. } => path.clone(),
            OrganizeError::FileMoveFailure { source, .. } => source.clone(),
        };
        PathError::new(path, error.to_string())
    }
}

/// Errors that can occur while organizing or reverting.
#[derive(Debug)]
pub enum OrganizeError {
    /// The file to move no longer exists.
    SourceMissing { path: PathBuf },
    /// Something already occupies the destination; nothing is overwritten.
    DestinationExists { path: PathBuf },
    /// Failed to create a destination directory.
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The rename itself failed (permissions, cross-device, ...).
    FileMoveFailure {
        source: PathBuf,
        destination: PathBuf,
        source_error: std::io::Error,
    },
    /// The root directory is invalid or doesn't exist.
    InvalidBasePath {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The bookkeeping directory or the requested manifest does not exist.
    ManifestMissing { path: PathBuf },
    /// Failed to write a manifest.
    ManifestWriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to read a manifest.
    ManifestReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for OrganizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceMissing { path } => {
                write!(f, "Source file no longer exists: {}", path.display())
            }
            Self::DestinationExists { path } => {
                write!(f, "Destination already exists: {}", path.display())
            }
            Self::DirectoryCreationFailed { path, source } => {
                write!(
                    f,
                    "Failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::FileMoveFailure {
                source,
                destination,
                source_error,
            } => {
                write!(
                    f,
                    "Failed to move {} to {}: {}",
                    source.display(),
                    destination.display(),
                    source_error
                )
            }
            Self::InvalidBasePath { path, source } => {
                write!(f, "Invalid root directory {}: {}", path.display(), source)
            }
            Self::ManifestMissing { path } => {
                write!(f, "Manifest not found: {}", path.display())
            }
            Self::ManifestWriteFailed { path, source } => {
                write!(f, "Failed to write manifest {}: {}", path.display(), source)
            }
            Self::ManifestReadFailed { path, source } => {
                write!(f, "Failed to read manifest {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for OrganizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DirectoryCreationFailed { source, .. }
            | Self::InvalidBasePath { source, .. }
            | Self::ManifestWriteFailed { source, .. }
            | Self::ManifestReadFailed { source, .. } => Some(source),
            Self::FileMoveFailure { source_error, .. } => Some(source_error),
            _ => None,
        }
    }
}

/// Result type for organizing operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Performs the physical moves for scans and reverts.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Returns the absolute, symlink-free form of `root`.
    ///
    /// Fails with `InvalidBasePath` unless `root` is an existing directory.
    /// Manifests store paths joined onto this form, so they stay valid no
    /// matter which working directory a later revert runs from.
    pub fn ensure_root(root: &Path) -> OrganizeResult<PathBuf> {
        let invalid = |source: std::io::Error| OrganizeError::InvalidBasePath {
            path: root.to_path_buf(),
            source,
        };

        let absolute = fs::canonicalize(root).map_err(invalid)?;
        if !absolute.is_dir() {
            return Err(invalid(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "root is not a directory",
            )));
        }
        Ok(absolute)
    }

    /// Moves `source` to `destination` and returns the record of the move.
    ///
    /// Missing parent directories of `destination` are created. The move is
    /// refused if `destination` already exists.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chrono::Local;
    /// use datetidy::file_organizer::FileOrganizer;
    /// use std::path::Path;
    ///
    /// let record = FileOrganizer::move_file(
    ///     Path::new("/data/inbox/a.txt"),
    ///     Path::new("/data/2023/03/txt/a.txt"),
    ///     &Local::now(),
    /// );
    /// match record {
    ///     Ok(r) => println!("{} -> {}", r.original_path.display(), r.new_path.display()),
    ///     Err(e) => eprintln!("{}", e),
    /// }
    /// ```
    pub fn move_file(
        source: &Path,
        destination: &Path,
        modified_at: &DateTime<Local>,
    ) -> OrganizeResult<MoveRecord> {
        Self::relocate(source, destination)?;
        info!(from = %source.display(), to = %destination.display(), "moved file");

        Ok(MoveRecord {
            original_path: source.to_path_buf(),
            new_path: destination.to_path_buf(),
            recorded_at: format_record_time(modified_at),
        })
    }

    /// Renames `source` to `destination`, creating parent directories.
    pub(crate) fn relocate(source: &Path, destination: &Path) -> OrganizeResult<()> {
        if fs::symlink_metadata(source).is_err() {
            return Err(OrganizeError::SourceMissing {
                path: source.to_path_buf(),
            });
        }
        if fs::symlink_metadata(destination).is_ok() {
            return Err(OrganizeError::DestinationExists {
                path: destination.to_path_buf(),
            });
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| OrganizeError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        fs::rename(source, destination).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OrganizeError::SourceMissing {
                    path: source.to_path_buf(),
                }
            } else {
                OrganizeError::FileMoveFailure {
                    source: source.to_path_buf(),
                    destination: destination.to_path_buf(),
                    source_error: e,
                }
            }
        })
    }

    /// Removes `dirs` and their ancestors while they are empty, deepest first.
    ///
    /// Never removes `root` itself, anything outside it, or a directory whose
    /// path carries the exclusion marker. Returns the removed directories.
    pub fn prune_empty_ancestors<'a, I>(root: &Path, dirs: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut candidates: Vec<&Path> = dirs.into_iter().collect();
        candidates.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });
        candidates.dedup();

        let mut removed = Vec::new();
        for start in candidates {
            let mut current = Some(start);
            while let Some(dir) = current {
                if dir == root || !dir.starts_with(root) || has_exclusion_marker(dir, root) {
                    break;
                }
                if !Self::is_empty_dir(dir) || fs::remove_dir(dir).is_err() {
                    break;
                }
                debug!(dir = %dir.display(), "removed empty directory");
                removed.push(dir.to_path_buf());
                current = dir.parent();
            }
        }
        removed
    }

    /// True if `dir` is a readable directory with no entries.
    pub fn is_empty_dir(dir: &Path) -> bool {
        fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
    }
}
