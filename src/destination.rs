//! Destination paths for organized files.
//!
//! Every organized file lands in `root/YYYY/MM/EXT/name`, where the year and
//! month come from the local calendar date of its modification time.

use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Format of the `modification_time` manifest column.
pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The extension folder name for a file name.
///
/// This is the lowercased text after the last `.`. Names without a usable
/// suffix (no `.` at all, or a trailing `.`) use the whole lowercased name.
///
/// ```
/// use datetidy::destination::extension_bucket;
///
/// assert_eq!(extension_bucket("Report.PDF"), "pdf");
/// assert_eq!(extension_bucket("notes.tar.gz"), "gz");
/// assert_eq!(extension_bucket("README"), "readme");
/// ```
pub fn extension_bucket(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => file_name.to_lowercase(),
    }
}

/// Computes where `file_path` belongs under `root`.
///
/// Pure function of its inputs; nothing is created on disk.
///
/// ```
/// use chrono::{Local, TimeZone};
/// use datetidy::destination::resolve;
/// use std::path::Path;
///
/// let when = Local.with_ymd_and_hms(2024, 11, 20, 9, 0, 0).unwrap();
/// let dest = resolve(Path::new("/data"), Path::new("/data/sub/b.log"), &when);
/// assert_eq!(dest, Path::new("/data/2024/11/log/b.log"));
/// ```
pub fn resolve(root: &Path, file_path: &Path, modified_at: &DateTime<Local>) -> PathBuf {
    let file_name = file_path
        .file_name()
        .unwrap_or_else(|| file_path.as_os_str());
    let bucket = extension_bucket(&file_name.to_string_lossy());

    root.join(modified_at.format("%Y").to_string())
        .join(modified_at.format("%m").to_string())
        .join(bucket)
        .join(file_name)
}

/// Reads the modification time of `path` in local time.
pub fn modified_at(path: &Path) -> io::Result<DateTime<Local>> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Local>::from(modified))
}

/// Formats a timestamp for the manifest's `modification_time` column.
pub fn format_record_time(time: &DateTime<Local>) -> String {
    time.format(RECORD_TIME_FORMAT).to_string()
}
