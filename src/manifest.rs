//! Session manifests: the CSV record of every move made by one scan.
//!
//! Manifests live in the bookkeeping directory under the root and are named
//! `_[sys]_old_structure_<YYYYMMDD_HHMMSS>.csv`. The layout (header row
//! `file_path,new_path,modification_time`, one row per move) is shared with
//! manifests written by earlier tools, so it must not change.

use crate::file_organizer::{MoveRecord, OrganizeError, OrganizeResult};
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the bookkeeping directory under the root.
pub const BOOKKEEPING_DIR: &str = "_[sys]_old_structure";

/// File name prefix of every manifest.
pub const MANIFEST_PREFIX: &str = "_[sys]_old_structure";

/// Manifest header row.
pub const MANIFEST_HEADERS: [&str; 3] = ["file_path", "new_path", "modification_time"];

const MANIFEST_EXTENSION: &str = "csv";

/// Path of the bookkeeping directory for `root`.
pub fn bookkeeping_dir(root: &Path) -> PathBuf {
    root.join(BOOKKEEPING_DIR)
}

/// Manifest file name for a session persisted at `now`.
pub fn manifest_file_name(now: &DateTime<Local>) -> String {
    format!(
        "{}_{}.{}",
        MANIFEST_PREFIX,
        now.format("%Y%m%d_%H%M%S"),
        MANIFEST_EXTENSION
    )
}

/// Records accumulated during one scan, persisted once at the end.
#[derive(Debug)]
pub struct ManifestSession {
    dir: PathBuf,
    records: Vec<MoveRecord>,
}

impl ManifestSession {
    /// Starts an empty session, creating the bookkeeping directory if needed.
    pub fn open(root: &Path) -> OrganizeResult<Self> {
        let dir = bookkeeping_dir(root);
        fs::create_dir_all(&dir).map_err(|e| OrganizeError::DirectoryCreationFailed {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self {
            dir,
            records: Vec::new(),
        })
    }

    /// Appends a completed move.
    pub fn record(&mut self, record: MoveRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[MoveRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes all records to a new manifest named after the current time.
    pub fn persist(&self) -> OrganizeResult<PathBuf> {
        self.persist_at(&Local::now())
    }

    /// Writes all records to the manifest named after `now`.
    ///
    /// The header is written even when the session recorded nothing. An
    /// existing manifest is never overwritten: if the name is taken, a
    /// numeric suffix (`_2`, `_3`, ...) is added before the extension.
    pub fn persist_at(&self, now: &DateTime<Local>) -> OrganizeResult<PathBuf> {
        let (path, file) = self.create_manifest_file(now)?;
        let write_failed = |e: csv::Error| OrganizeError::ManifestWriteFailed {
            path: path.clone(),
            source: e.into(),
        };

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(MANIFEST_HEADERS).map_err(write_failed)?;
        for record in &self.records {
            writer.serialize(record).map_err(write_failed)?;
        }
        writer
            .flush()
            .map_err(|e| OrganizeError::ManifestWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        info!(manifest = %path.display(), records = self.records.len(), "manifest saved");
        Ok(path)
    }

    fn create_manifest_file(&self, now: &DateTime<Local>) -> OrganizeResult<(PathBuf, File)> {
        let base = manifest_file_name(now);
        let stem = base.trim_end_matches(&format!(".{}", MANIFEST_EXTENSION));

        let mut attempt = 1u32;
        loop {
            let name = if attempt == 1 {
                base.clone()
            } else {
                format!("{}_{}.{}", stem, attempt, MANIFEST_EXTENSION)
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(OrganizeError::ManifestWriteFailed { path, source: e }),
            }
        }
    }
}

/// A manifest row that could not be understood; it is skipped on revert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based line number in the manifest file.
    pub line: u64,
    pub reason: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

/// Records read back from a manifest, in file order.
#[derive(Debug, Default)]
pub struct LoadedManifest {
    pub records: Vec<MoveRecord>,
    pub row_errors: Vec<RowError>,
}

/// Reads a manifest, skipping malformed rows.
///
/// A row is malformed when it lacks one of the named columns or has an empty
/// path. Fails only if the file cannot be opened or read.
pub fn load_manifest(path: &Path) -> OrganizeResult<LoadedManifest> {
    let read_failed = |e: csv::Error| OrganizeError::ManifestReadFailed {
        path: path.to_path_buf(),
        source: e.into(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(read_failed)?;
    let headers = reader.headers().map_err(read_failed)?.clone();

    let mut loaded = LoadedManifest::default();
    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) if e.is_io_error() => return Err(read_failed(e)),
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                warn!(manifest = %path.display(), line, error = %e, "skipping manifest row");
                loaded.row_errors.push(RowError {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let line = row.position().map(|p| p.line()).unwrap_or_default();
        match row.deserialize::<MoveRecord>(Some(&headers)) {
            Ok(record)
                if !record.original_path.as_os_str().is_empty()
                    && !record.new_path.as_os_str().is_empty() =>
            {
                loaded.records.push(record);
            }
            Ok(_) => {
                warn!(manifest = %path.display(), line, "skipping manifest row with an empty path");
                loaded.row_errors.push(RowError {
                    line,
                    reason: "empty path".to_string(),
                });
            }
            Err(e) => {
                warn!(manifest = %path.display(), line, error = %e, "skipping manifest row");
                loaded.row_errors.push(RowError {
                    line,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(loaded)
}

/// Names of the manifests stored under `root`, sorted.
///
/// An absent bookkeeping directory means there is nothing to list.
pub fn list_manifests(root: &Path) -> OrganizeResult<Vec<String>> {
    let dir = bookkeeping_dir(root);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(&dir).map_err(|e| OrganizeError::ManifestReadFailed {
        path: dir.clone(),
        source: e,
    })?;

    let mut names: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| {
            Path::new(name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(MANIFEST_EXTENSION))
        })
        .collect();
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(hour: u32, min: u32, sec: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 1, 2, hour, min, sec)
            .single()
            .expect("unambiguous local time")
    }

    fn record(root: &Path, name: &str) -> MoveRecord {
        MoveRecord {
            original_path: root.join(name),
            new_path: root.join("2024").join("01").join("txt").join(name),
            recorded_at: "2024-01-02 03:04:05".to_string(),
        }
    }

    #[test]
    fn test_manifest_file_name() {
        assert_eq!(
            manifest_file_name(&at(9, 8, 7)),
            "_[sys]_old_structure_20240102_090807.csv"
        );
    }

    #[test]
    fn test_open_creates_bookkeeping_dir_idempotently() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();

        ManifestSession::open(root).expect("first open failed");
        ManifestSession::open(root).expect("second open failed");
        assert!(bookkeeping_dir(root).is_dir());
    }

    #[test]
    fn test_persist_writes_header_and_rows() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();

        let mut session = ManifestSession::open(root).expect("open failed");
        session.record(record(root, "a.txt"));
        session.record(record(root, "b.txt"));
        let path = session.persist_at(&at(10, 0, 0)).expect("persist failed");

        assert_eq!(
            path,
            bookkeeping_dir(root).join("_[sys]_old_structure_20240102_100000.csv")
        );
        let content = fs::read_to_string(&path).expect("Failed to read manifest");
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("file_path,new_path,modification_time"));
        let first = lines.next().expect("missing first row");
        assert!(first.starts_with(&root.join("a.txt").to_string_lossy().to_string()));
        assert!(first.ends_with(",2024-01-02 03:04:05"));
        assert!(lines.next().is_some());
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_persist_empty_session_writes_header_only() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let session = ManifestSession::open(temp_dir.path()).expect("open failed");
        assert!(session.is_empty());

        let path = session.persist_at(&at(11, 0, 0)).expect("persist failed");
        let content = fs::read_to_string(&path).expect("Failed to read manifest");
        assert_eq!(content.trim_end(), "file_path,new_path,modification_time");
    }

    #[test]
    fn test_persist_never_overwrites_same_second_manifest() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let now = at(13, 14, 15);

        let mut first = ManifestSession::open(root).expect("open failed");
        first.record(record(root, "a.txt"));
        let first_path = first.persist_at(&now).expect("persist failed");

        let second = ManifestSession::open(root).expect("open failed");
        let second_path = second.persist_at(&now).expect("persist failed");

        assert_ne!(first_path, second_path);
        assert_eq!(
            second_path.file_name().unwrap().to_string_lossy(),
            "_[sys]_old_structure_20240102_131415_2.csv"
        );
        let loaded = load_manifest(&first_path).expect("load failed");
        assert_eq!(loaded.records.len(), 1);
    }

    #[test]
    fn test_load_preserves_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();

        let mut session = ManifestSession::open(root).expect("open failed");
        let records = vec![
            record(root, "z.txt"),
            record(root, "a.txt"),
            record(root, "m.txt"),
        ];
        for r in &records {
            session.record(r.clone());
        }
        assert_eq!(session.len(), 3);
        let path = session.persist_at(&at(12, 0, 0)).expect("persist failed");

        let loaded = load_manifest(&path).expect("load failed");
        assert!(loaded.row_errors.is_empty());
        assert_eq!(loaded.records, records);
    }

    #[test]
    fn test_load_skips_malformed_rows() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("legacy.csv");
        fs::write(
            &path,
            "file_path,new_path,modification_time\n\
             /r/a.txt,/r/2023/03/txt/a.txt,2023-03-05 10:00:00\n\
             /r/broken.txt\n\
             ,/r/2023/03/txt/c.txt,2023-03-05 10:00:00\n\
             /r/d.txt,/r/2023/03/txt/d.txt,2023-03-05 10:00:00\n",
        )
        .unwrap();

        let loaded = load_manifest(&path).expect("load failed");
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[0].original_path, PathBuf::from("/r/a.txt"));
        assert_eq!(loaded.records[1].original_path, PathBuf::from("/r/d.txt"));
        assert_eq!(loaded.row_errors.len(), 2);
        assert_eq!(loaded.row_errors[0].line, 3);
        assert_eq!(loaded.row_errors[1].line, 4);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = load_manifest(Path::new("/non/existent/manifest.csv"));
        assert!(matches!(
            result,
            Err(OrganizeError::ManifestReadFailed { .. })
        ));
    }

    #[test]
    fn test_list_manifests_sorted_csv_only() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        assert!(list_manifests(root).expect("list failed").is_empty());

        let dir = bookkeeping_dir(root);
        fs::create_dir_all(dir.join("nested.csv")).unwrap();
        fs::write(dir.join("_[sys]_old_structure_20240102_100000.csv"), "").unwrap();
        fs::write(dir.join("_[sys]_old_structure_20230102_100000.csv"), "").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();

        assert_eq!(
            list_manifests(root).expect("list failed"),
            vec![
                "_[sys]_old_structure_20230102_100000.csv".to_string(),
                "_[sys]_old_structure_20240102_100000.csv".to_string(),
            ]
        );
    }
}
