//! Depth-first traversal of a root directory.

use crate::classifier::Entry;
use crate::file_organizer::PathError;
use std::path::Path;
use walkdir::WalkDir;

/// Lazy depth-first iterator over the entries below a root.
///
/// The root itself is not yielded. Entries within a directory come in file
/// name order. A directory that cannot be read produces one `Err` item and
/// its contents are skipped; iteration then continues with its siblings.
/// Symbolic links are not followed; a link to a directory is not yielded,
/// any other link is reported as a file.
pub struct Walker {
    inner: walkdir::IntoIter,
}

impl Walker {
    pub fn new(root: &Path) -> Self {
        let inner = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        Self { inner }
    }
}

impl Iterator for Walker {
    type Item = Result<Entry, PathError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    return Some(Err(PathError::new(path, e.to_string())));
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                return Some(Ok(Entry::directory(entry.into_path())));
            }
            if file_type.is_symlink() && entry.path().is_dir() {
                continue;
            }
            return Some(Ok(Entry::file(entry.into_path())));
        }
    }
}

/// Walks `root` depth-first. See [`Walker`].
pub fn walk(root: &Path) -> Walker {
    Walker::new(root)
}
