//! Locating the root from an instructions file.
//!
//! An instructions file is a small CSV named `instructions.csv` or
//! `_[sys]_instructions.csv`. Its directory becomes the root. It is only
//! trusted if its second line contains `set location`. Every following row
//! may name, in its second column, a root-relative directory to scan under
//! the listed-dirs policy:
//!
//! ```text
//! action,directory
//! set location,
//! scan,Inbox
//! scan,Work/2020
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// File names recognised as instructions files (compared case-insensitively).
pub const INSTRUCTIONS_FILE_NAMES: [&str; 2] = ["instructions.csv", "_[sys]_instructions.csv"];

/// Phrase the second line of an instructions file must contain.
pub const LOCATION_DIRECTIVE: &str = "set location";

/// Errors that prevent a root from being established.
#[derive(Debug)]
pub enum BootstrapError {
    /// No instructions file exists under any search path.
    NotFound { searched: Vec<PathBuf> },
    /// The instructions file could not be read.
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The second line does not contain the location directive.
    MissingLocationDirective { path: PathBuf },
}

impl std::fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BootstrapError::NotFound { searched } => {
                let searched: Vec<String> =
                    searched.iter().map(|p| p.display().to_string()).collect();
                write!(
                    f,
                    "No '{}' or '{}' file found (searched: {})",
                    INSTRUCTIONS_FILE_NAMES[0],
                    INSTRUCTIONS_FILE_NAMES[1],
                    searched.join(", ")
                )
            }
            BootstrapError::Unreadable { path, source } => {
                write!(
                    f,
                    "Error reading instructions file {}: {}",
                    path.display(),
                    source
                )
            }
            BootstrapError::MissingLocationDirective { path } => {
                write!(
                    f,
                    "The second line of {} does not contain '{}'",
                    path.display(),
                    LOCATION_DIRECTIVE
                )
            }
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BootstrapError::Unreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A validated instructions file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instructions {
    /// The instructions file itself.
    pub file: PathBuf,
    /// The directory the engine operates on.
    pub root: PathBuf,
    /// Root-relative directories for the listed-dirs policy.
    pub allow_list: Vec<PathBuf>,
}

impl Instructions {
    /// Finds, validates and reads the first instructions file under `search_paths`.
    ///
    /// Search paths that do not exist are ignored.
    pub fn discover(search_paths: &[PathBuf]) -> Result<Self, BootstrapError> {
        let file = find_instructions_file(search_paths).ok_or_else(|| BootstrapError::NotFound {
            searched: search_paths.to_vec(),
        })?;
        Self::load(&file)
    }

    /// Validates and reads a specific instructions file.
    pub fn load(path: &Path) -> Result<Self, BootstrapError> {
        let content = fs::read_to_string(path).map_err(|e| BootstrapError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        })?;

        if !has_location_directive(&content) {
            return Err(BootstrapError::MissingLocationDirective {
                path: path.to_path_buf(),
            });
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let root = fs::canonicalize(dir).map_err(|e| BootstrapError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        let allow_list = read_allow_list(&content);
        info!(
            file = %path.display(),
            root = %root.display(),
            listed = allow_list.len(),
            "location set"
        );

        Ok(Self {
            file: path.to_path_buf(),
            root,
            allow_list,
        })
    }
}

/// True if `name` is one of the instructions file names.
pub fn is_instructions_file_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    INSTRUCTIONS_FILE_NAMES.iter().any(|n| *n == lower)
}

/// Depth-first search of each path in turn; the first match wins.
pub fn find_instructions_file(search_paths: &[PathBuf]) -> Option<PathBuf> {
    search_paths
        .iter()
        .filter(|path| path.is_dir())
        .find_map(|path| {
            WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .find(|entry| {
                    entry.file_type().is_file()
                        && is_instructions_file_name(&entry.file_name().to_string_lossy())
                })
                .map(walkdir::DirEntry::into_path)
        })
}

fn has_location_directive(content: &str) -> bool {
    content
        .lines()
        .nth(1)
        .is_some_and(|line| line.trim().to_lowercase().contains(LOCATION_DIRECTIVE))
}

/// Second column of every row after the header, trimmed, empty ones dropped.
fn read_allow_list(content: &str) -> Vec<PathBuf> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut allow_list = Vec::new();
    for result in reader.records() {
        match result {
            Ok(row) => {
                if let Some(dir) = row.get(1).map(str::trim)
                    && !dir.is_empty()
                {
                    allow_list.push(PathBuf::from(dir));
                }
            }
            Err(e) => {
                warn!(error = %e, "stopped reading instructions rows");
                break;
            }
        }
    }
    allow_list
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VALID: &str = "action,directory\nSet Location,\nscan, Inbox \nscan,Work/2020\nnote\nscan,\n";

    #[test]
    fn test_load_valid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("_[sys]_instructions.csv");
        fs::write(&path, VALID).unwrap();

        let instructions = Instructions::load(&path).expect("load failed");
        assert_eq!(instructions.root, fs::canonicalize(temp_dir.path()).unwrap());
        assert_eq!(
            instructions.allow_list,
            vec![PathBuf::from("Inbox"), PathBuf::from("Work/2020")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_load_relative_path_yields_absolute_root() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = fs::canonicalize(temp_dir.path()).unwrap();
        fs::write(dir.join("instructions.csv"), VALID).unwrap();

        let cwd = fs::canonicalize(std::env::current_dir().unwrap()).unwrap();
        let mut relative: PathBuf = std::iter::repeat_n("..", cwd.components().count() - 1).collect();
        relative.push(dir.strip_prefix("/").unwrap());
        relative.push("instructions.csv");
        assert!(relative.is_relative());

        let instructions = Instructions::load(&relative).expect("load failed");
        assert!(instructions.root.is_absolute());
        assert_eq!(instructions.root, dir);
    }

    #[test]
    fn test_load_requires_directive_on_second_line() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("instructions.csv");

        fs::write(&path, "set location\nsomething else\n").unwrap();
        assert!(matches!(
            Instructions::load(&path),
            Err(BootstrapError::MissingLocationDirective { .. })
        ));

        fs::write(&path, "only one line\n").unwrap();
        assert!(matches!(
            Instructions::load(&path),
            Err(BootstrapError::MissingLocationDirective { .. })
        ));
    }

    #[test]
    fn test_load_unreadable() {
        assert!(matches!(
            Instructions::load(Path::new("/non/existent/instructions.csv")),
            Err(BootstrapError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_file_name_matching_is_case_insensitive() {
        assert!(is_instructions_file_name("Instructions.CSV"));
        assert!(is_instructions_file_name("_[SYS]_instructions.csv"));
        assert!(!is_instructions_file_name("instructions.txt"));
    }

    #[test]
    fn test_discover_walks_search_paths() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested = temp_dir.path().join("drive").join("photos");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("instructions.csv"), VALID).unwrap();

        let search = vec![
            temp_dir.path().join("missing"),
            temp_dir.path().join("drive"),
        ];
        let instructions = Instructions::discover(&search).expect("discover failed");
        assert_eq!(instructions.root, fs::canonicalize(&nested).unwrap());
        assert_eq!(instructions.file, nested.join("instructions.csv"));
    }

    #[test]
    fn test_discover_not_found() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = Instructions::discover(&[temp_dir.path().to_path_buf()]);
        assert!(matches!(result, Err(BootstrapError::NotFound { .. })));
    }
}
