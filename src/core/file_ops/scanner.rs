use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;
use crate::models::{is_excluded, ArchiveError, SourceEntry};

/// Expands creation inputs into the list of files to archive
///
/// - Bare file inputs become members named by their base name.
/// - Directory inputs contribute their files under the directory's own
///   name, so `photos/2024/a.jpg` stays `photos/2024/a.jpg` in the archive.
/// - Without recursion only the top level of a directory is taken and
///   nested directories are skipped.
/// - Files whose name ends with the exclusion suffix are dropped.
///
/// Traversal is depth-first with entries sorted by file name, so the
/// same tree always yields the same member order.
pub struct InputScanner {
    recursive: bool,
    exclusion_suffix: Option<String>,
}

impl InputScanner {
    pub fn new(recursive: bool) -> Self {
        Self {
            recursive,
            exclusion_suffix: None,
        }
    }

    pub fn with_exclusion(mut self, suffix: Option<&str>) -> Self {
        self.exclusion_suffix = suffix.filter(|s| !s.is_empty()).map(str::to_string);
        self
    }

    /// Resolve every input path, in input order
    pub fn scan(&self, inputs: &[PathBuf]) -> Result<Vec<SourceEntry>, ArchiveError> {
        let mut entries = Vec::new();

        for input in inputs {
            let metadata = fs::metadata(input)
                .map_err(|e| ArchiveError::SourceUnreadable(
                    format!("{}: {}", input.display(), e)
                ))?;

            if metadata.is_dir() {
                self.scan_directory(input, &mut entries)?;
            } else if metadata.is_file() {
                let name = base_name(input)?;
                if !self.excluded(&name) {
                    entries.push(SourceEntry::new(name, input));
                }
            }
        }

        Ok(entries)
    }

    fn scan_directory(&self, root: &Path, entries: &mut Vec<SourceEntry>) -> Result<(), ArchiveError> {
        let prefix = directory_prefix(root);
        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let walker = WalkDir::new(root)
            .follow_links(false)
            .max_depth(max_depth)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| ArchiveError::SourceUnreadable(
                format!("Failed to walk {}: {}", root.display(), e)
            ))?;

            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            if self.excluded(&file_name) {
                continue;
            }

            let relative = entry.path().strip_prefix(root)
                .map_err(|e| ArchiveError::SourceUnreadable(
                    format!("Failed to calculate relative path: {}", e)
                ))?;

            let name = match &prefix {
                Some(prefix) => format!("{}/{}", prefix, to_member_name(relative)),
                None => to_member_name(relative),
            };
            entries.push(SourceEntry::new(name, entry.path()));
        }

        Ok(())
    }

    fn excluded(&self, name: &str) -> bool {
        is_excluded(name, self.exclusion_suffix.as_deref())
    }
}

/// Base name of a file input, as a member name
pub fn base_name(path: &Path) -> Result<String, ArchiveError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ArchiveError::SourceUnreadable(
            format!("{} has no file name", path.display())
        ))
}

/// Join relative path components with `/`, whatever the host separator
pub fn to_member_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Name a directory input contributes as prefix (`.` resolves to the cwd name)
fn directory_prefix(root: &Path) -> Option<String> {
    match root.file_name() {
        Some(name) => Some(name.to_string_lossy().into_owned()),
        None => fs::canonicalize(root)
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned())),
    }
}
