// Archive handler trait for different compression formats

use std::path::{Component, Path, PathBuf};
use crate::models::{ArchiveError, ArchiveMember, FormatDescriptor, FormatId, SourceEntry};

/// Decides which members an extraction materializes
pub type MemberFilter<'a> = &'a dyn Fn(&str) -> bool;

/// Trait for handling different archive formats
///
/// Handlers are stateless between calls: each operation opens the
/// artifact, acts and releases it. Capability checks (append/delete
/// allowed, input counts) happen in `ArchiveProcessor` before a handler
/// is reached; the default `append`/`delete` bodies only guard against
/// misuse.
pub trait ArchiveHandler: Send + Sync {
    /// Check if this handler encodes the given format
    fn supports(&self, format: FormatId) -> bool;

    /// Write a new unencrypted archive containing `entries` at `output`
    fn create(
        &self,
        format: &FormatDescriptor,
        entries: &[SourceEntry],
        output: &Path,
    ) -> Result<(), ArchiveError>;

    /// Enumerate members in native order without extracting payloads
    fn list(&self, format: &FormatDescriptor, archive_path: &Path) -> Result<Vec<ArchiveMember>, ArchiveError>;

    /// Extract members accepted by `keep` into `dest_dir`, returning their names
    fn extract(
        &self,
        format: &FormatDescriptor,
        archive_path: &Path,
        dest_dir: &Path,
        keep: MemberFilter<'_>,
    ) -> Result<Vec<String>, ArchiveError>;

    /// Add files to an existing archive without rewriting existing members
    fn append(
        &self,
        format: &FormatDescriptor,
        _archive_path: &Path,
        _entries: &[SourceEntry],
    ) -> Result<(), ArchiveError> {
        Err(ArchiveError::OperationUnsupported(
            format!("{} archives cannot be appended to", format.id)
        ))
    }

    /// Write a copy of the archive without `member_name` to `output`
    fn repack_without(
        &self,
        format: &FormatDescriptor,
        _archive_path: &Path,
        _member_name: &str,
        _output: &Path,
    ) -> Result<(), ArchiveError> {
        Err(ArchiveError::OperationUnsupported(
            format!("Members cannot be deleted from {} archives", format.id)
        ))
    }
}

/// Join an archive member name under `dest_dir`, refusing names that would
/// land outside it (absolute paths, `..`, drive prefixes)
pub fn enclosed_path(dest_dir: &Path, member_name: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(member_name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(dest_dir.join(relative))
}

/// Create the parent directories of an output file
pub fn ensure_parent(path: &Path) -> Result<(), ArchiveError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to create directory {}: {}", parent.display(), e)
            ))?;
    }
    Ok(())
}
