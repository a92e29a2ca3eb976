//! Reverting a scan by replaying its manifest backwards.
//!
//! Each record moves `new_path` back to `original_path`, in manifest order.
//! Records whose file is no longer at `new_path` are skipped quietly, which
//! makes reverting the same manifest twice harmless. Afterwards every
//! directory under the root that ended up empty is removed, except marked
//! ones such as the bookkeeping directory.
use crate::classifier::has_exclusion_marker;
use crate::file_organizer::{FileOrganizer, OrganizeError, OrganizeResult, PathError};
use crate::manifest::{RowError, bookkeeping_dir, load_manifest};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Represents the result of a revert.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files moved back to their original location.
    pub restored: usize,
    /// Records whose file was not at its recorded location (already reverted or gone).
    pub missing: Vec<PathBuf>,
    /// Records that could not be restored, with the reason.
    pub errors: Vec<PathError>,
    /// Manifest rows that could not be parsed.
    pub skipped_rows: Vec<RowError>,
    /// Directories removed by the empty-directory sweep.
    pub pruned_dirs: Vec<PathBuf>,
}

impl UndoReport {
    /// Returns the total number of manifest rows processed.
    pub fn total_processed(&self) -> usize {
        self.restored + self.missing.len() + self.errors.len() + self.skipped_rows.len()
    }

    /// Returns true if every record was either restored or already gone.
    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty() && self.skipped_rows.is_empty()
    }
}

/// Manages reverts of earlier scans.
pub struct UndoManager;

impl UndoManager {
    /// Reverts the scan recorded in `manifest_name` under `root`.
    ///
    /// # Errors
    ///
    /// Returns `ManifestMissing` if the bookkeeping directory or the named
    /// manifest does not exist, and `ManifestReadFailed` if it cannot be read.
    /// Problems with individual records are collected in the report instead.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use datetidy::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// let result = UndoManager::revert(
    ///     Path::new("/path/to/root"),
    ///     "_[sys]_old_structure_20240102_100000.csv",
    /// );
    /// match result {
    ///     Ok(report) => println!("Restored {} files", report.restored),
    ///     Err(e) => eprintln!("Revert failed: {}", e),
    /// }
    /// ```
    pub fn revert(root: &Path, manifest_name: &str) -> OrganizeResult<UndoReport> {
        let manifest_path = Self::manifest_path(root, manifest_name)?;
        let loaded = load_manifest(&manifest_path)?;
        info!(
            manifest = %manifest_path.display(),
            records = loaded.records.len(),
            "reverting"
        );

        let mut report = UndoReport {
            skipped_rows: loaded.row_errors,
            ..UndoReport::default()
        };

        for record in &loaded.records {
            if fs::symlink_metadata(&record.new_path).is_err() {
                debug!(path = %record.new_path.display(), "already gone, skipping");
                report.missing.push(record.new_path.clone());
                continue;
            }

            match FileOrganizer::relocate(&record.new_path, &record.original_path) {
                Ok(()) => {
                    info!(
                        from = %record.new_path.display(),
                        to = %record.original_path.display(),
                        "restored file"
                    );
                    report.restored += 1;
                }
                Err(e) => {
                    warn!(path = %record.new_path.display(), error = %e, "could not restore");
                    report.errors.push(PathError::new(&record.new_path, e.to_string()));
                }
            }
        }

        report.pruned_dirs = Self::remove_empty_directories(root);
        Ok(report)
    }

    /// Removes every empty directory below `root`, deepest first.
    ///
    /// `root` itself and any directory whose path carries the exclusion
    /// marker are kept. Returns the removed directories.
    pub fn remove_empty_directories(root: &Path) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .contents_first(true);

        for entry in walker.into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_dir() {
                continue;
            }
            let dir = entry.path();
            if has_exclusion_marker(dir, root) || !FileOrganizer::is_empty_dir(dir) {
                continue;
            }
            match fs::remove_dir(dir) {
                Ok(()) => {
                    debug!(dir = %dir.display(), "removed empty directory");
                    removed.push(dir.to_path_buf());
                }
                Err(e) => warn!(dir = %dir.display(), error = %e, "could not remove directory"),
            }
        }
        removed
    }

    fn manifest_path(root: &Path, manifest_name: &str) -> OrganizeResult<PathBuf> {
        let dir = bookkeeping_dir(root);
        if !dir.is_dir() {
            return Err(OrganizeError::ManifestMissing { path: dir });
        }

        // Only plain file names inside the bookkeeping directory are accepted.
        let path = dir.join(manifest_name);
        let is_plain_name = Path::new(manifest_name).file_name() == Some(OsStr::new(manifest_name));
        if !is_plain_name || !path.is_file() {
            return Err(OrganizeError::ManifestMissing { path });
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_organizer::MoveRecord;
    use crate::manifest::ManifestSession;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    fn organize(root: &Path, name: &str, bucket: &str) -> MoveRecord {
        let source = root.join(name);
        let when = Local
            .with_ymd_and_hms(2023, 3, 5, 12, 0, 0)
            .single()
            .expect("unambiguous local time");
        let file_name = source.file_name().expect("file name");
        let destination = root.join("2023").join("03").join(bucket).join(file_name);
        FileOrganizer::move_file(&source, &destination, &when).expect("Failed to move file")
    }

    fn save(root: &Path, records: Vec<MoveRecord>) -> String {
        let mut session = ManifestSession::open(root).expect("open failed");
        for record in records {
            session.record(record);
        }
        let path = session.persist().expect("persist failed");
        path.file_name().unwrap().to_string_lossy().into_owned()
    }

    #[test]
    fn test_revert_missing_bookkeeping_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = UndoManager::revert(temp_dir.path(), "whatever.csv");
        assert!(matches!(result, Err(OrganizeError::ManifestMissing { .. })));
    }

    #[test]
    fn test_revert_missing_manifest_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir_all(bookkeeping_dir(temp_dir.path())).unwrap();
        let result = UndoManager::revert(temp_dir.path(), "nope.csv");
        assert!(matches!(result, Err(OrganizeError::ManifestMissing { .. })));
    }

    #[test]
    fn test_revert_rejects_paths_outside_bookkeeping_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(bookkeeping_dir(root)).unwrap();
        fs::write(root.join("outside.csv"), "file_path,new_path,modification_time\n").unwrap();

        let result = UndoManager::revert(root, "../outside.csv");
        assert!(matches!(result, Err(OrganizeError::ManifestMissing { .. })));
    }

    #[test]
    fn test_revert_restores_and_prunes() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b.log"), "b").unwrap();

        let records = vec![organize(root, "a.txt", "txt"), organize(root, "b.log", "log")];
        let manifest = save(root, records);

        let report = UndoManager::revert(root, &manifest).expect("revert failed");

        assert_eq!(report.restored, 2);
        assert!(report.is_complete_success());
        assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(root.join("b.log")).unwrap(), "b");
        assert!(!root.join("2023").exists());
        assert!(bookkeeping_dir(root).is_dir());
    }

    #[test]
    fn test_revert_twice_restores_nothing_the_second_time() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "a").unwrap();

        let manifest = save(root, vec![organize(root, "a.txt", "txt")]);

        let first = UndoManager::revert(root, &manifest).expect("first revert failed");
        assert_eq!(first.restored, 1);

        let second = UndoManager::revert(root, &manifest).expect("second revert failed");
        assert_eq!(second.restored, 0);
        assert_eq!(second.missing.len(), 1);
        assert!(second.is_complete_success());
        assert!(root.join("a.txt").exists());
    }

    #[test]
    fn test_revert_recreates_original_parent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("c.md"), "c").unwrap();

        let record = organize(root, "sub/c.md", "md");
        fs::remove_dir(root.join("sub")).unwrap();
        let manifest = save(root, vec![record]);

        let report = UndoManager::revert(root, &manifest).expect("revert failed");
        assert_eq!(report.restored, 1);
        assert!(root.join("sub").join("c.md").exists());
    }

    #[test]
    fn test_revert_does_not_overwrite_occupied_original() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "original").unwrap();
        let record = organize(root, "a.txt", "txt");
        let moved = record.new_path.clone();
        let manifest = save(root, vec![record]);

        fs::write(root.join("a.txt"), "newcomer").unwrap();

        let report = UndoManager::revert(root, &manifest).expect("revert failed");
        assert_eq!(report.restored, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.is_complete_success());
        assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "newcomer");
        assert_eq!(fs::read_to_string(&moved).unwrap(), "original");
    }

    #[test]
    fn test_revert_skips_malformed_rows_and_continues() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "a").unwrap();
        let record = organize(root, "a.txt", "txt");

        let dir = bookkeeping_dir(root);
        fs::create_dir_all(&dir).unwrap();
        let content = format!(
            "file_path,new_path,modification_time\njunk\n{},{},{}\n",
            record.original_path.display(),
            record.new_path.display(),
            record.recorded_at
        );
        fs::write(dir.join("hand_written.csv"), content).unwrap();

        let report = UndoManager::revert(root, "hand_written.csv").expect("revert failed");
        assert_eq!(report.restored, 1);
        assert_eq!(report.skipped_rows.len(), 1);
        assert_eq!(report.total_processed(), 2);
        assert!(root.join("a.txt").exists());
    }

    #[test]
    fn test_remove_empty_directories_keeps_marked_and_root() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("x").join("y").join("z")).unwrap();
        fs::create_dir_all(root.join("keep_[sys]_").join("empty")).unwrap();
        fs::create_dir_all(root.join("full")).unwrap();
        fs::write(root.join("full").join("f.txt"), "f").unwrap();

        let removed = UndoManager::remove_empty_directories(root);

        assert!(!root.join("x").exists());
        assert_eq!(removed.len(), 3);
        assert!(root.join("keep_[sys]_").join("empty").exists());
        assert!(root.join("full").exists());
        assert!(root.exists());
    }
}
