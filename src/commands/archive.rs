use std::path::{Path, PathBuf};
use serde::Serialize;
use crate::core::checksum::ChecksumCalculator;
use crate::core::compression::ArchiveProcessor;
use crate::models::{
    ArchiveError, ArchiveErrorKind, ArchiveMember, CreationRequest, ExtractionRequest,
    FormatDescriptor, FormatId, FormatRegistry,
};
use crate::utils::format::format_size;
use crate::utils::worker::BackgroundTask;

const DELETE_ENABLED_LABEL: &str = "Delete Selected";
const DELETE_DISABLED_LABEL: &str = "Delete Disabled (Compressed)";

/// One row of the format picker
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatInfo {
    #[serde(flatten)]
    pub descriptor: &'static FormatDescriptor,
    /// Text for the delete action when an archive of this format is open
    pub delete_label: &'static str,
}

/// One row of the member table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRow {
    pub name: String,
    pub size_bytes: u64,
    /// e.g. "1,234 bytes"
    pub size_label: String,
    /// e.g. "Zip Entry"
    pub kind_label: &'static str,
    pub is_dir: bool,
}

/// Everything the management view shows for an opened archive
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveListing {
    pub path: String,
    pub format: &'static str,
    pub members: Vec<MemberRow>,
    pub can_append: bool,
    pub can_delete: bool,
    pub delete_label: &'static str,
}

/// The capability table, for pre-validating user choices
pub fn list_formats() -> Vec<FormatInfo> {
    FormatRegistry::all()
        .iter()
        .map(|descriptor| FormatInfo {
            descriptor,
            delete_label: delete_label(descriptor),
        })
        .collect()
}

/// Create an archive and return its path
pub fn create_archive(processor: &ArchiveProcessor, request: &CreationRequest) -> Result<String, String> {
    let handle = processor.create(request).map_err(|e| describe_error(&e))?;
    Ok(handle.path().display().to_string())
}

/// List an archive's members
///
/// Without an explicit format, the archive's extension decides.
pub fn list_archive(
    processor: &ArchiveProcessor,
    archive_path: &str,
    format: Option<&str>,
) -> Result<ArchiveListing, String> {
    let path = PathBuf::from(archive_path);
    let descriptor = resolve_format(&path, format).map_err(|e| describe_error(&e))?;

    let members = processor
        .list(&path, descriptor.id)
        .map_err(|e| describe_error(&e))?;

    Ok(ArchiveListing {
        path: archive_path.to_string(),
        format: descriptor.id,
        members: members.iter().map(|m| member_row(descriptor, m)).collect(),
        can_append: descriptor.supports_append,
        can_delete: descriptor.supports_delete,
        delete_label: delete_label(descriptor),
    })
}

/// Extract an archive and return the extracted member names
pub fn extract_archive(processor: &ArchiveProcessor, request: &ExtractionRequest) -> Result<Vec<String>, String> {
    processor.extract(request).map_err(|e| describe_error(&e))
}

pub fn append_to_archive(
    processor: &ArchiveProcessor,
    archive_path: &str,
    format: Option<&str>,
    files: &[String],
) -> Result<(), String> {
    let path = PathBuf::from(archive_path);
    let descriptor = resolve_format(&path, format).map_err(|e| describe_error(&e))?;
    let files: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();

    processor
        .append(&path, descriptor.id, &files)
        .map_err(|e| describe_error(&e))
}

pub fn delete_from_archive(
    processor: &ArchiveProcessor,
    archive_path: &str,
    format: Option<&str>,
    member_name: &str,
) -> Result<(), String> {
    let path = PathBuf::from(archive_path);
    let descriptor = resolve_format(&path, format).map_err(|e| describe_error(&e))?;

    processor
        .delete_member(&path, descriptor.id, member_name)
        .map_err(|e| describe_error(&e))
}

/// Hash an artifact on the background pool
///
/// The task yields `SHA-256: <hex>` once the whole file has been read.
pub fn compute_checksum(archive_path: &str, chunk_size: usize) -> BackgroundTask<Result<String, String>> {
    BackgroundTask::spawn(checksum_job(archive_path, chunk_size))
}

/// Hash an artifact on the background pool and hand the result to `on_done`
///
/// `on_done` runs on the worker thread.
pub fn compute_checksum_then<C>(archive_path: &str, chunk_size: usize, on_done: C)
where
    C: FnOnce(Result<String, String>) + Send + 'static,
{
    BackgroundTask::spawn_with_callback(checksum_job(archive_path, chunk_size), on_done);
}

fn checksum_job(archive_path: &str, chunk_size: usize) -> impl FnOnce() -> Result<String, String> + Send + 'static {
    let path = PathBuf::from(archive_path);
    move || {
        ChecksumCalculator::new(chunk_size)
            .sha256_hex(&path)
            .map(|digest| format!("SHA-256: {}", digest))
            .map_err(|e| describe_error(&e))
    }
}

/// User-facing text for an archive error
pub fn describe_error(err: &ArchiveError) -> String {
    match err.kind() {
        ArchiveErrorKind::UnknownFormat => format!("Unknown archive format: {}", detail(err)),
        ArchiveErrorKind::InputCountViolation => match err {
            ArchiveError::InputCountViolation { format, .. } => {
                format!("{} allows only ONE input file.", format)
            }
            _ => err.to_string(),
        },
        ArchiveErrorKind::EmptyInput => {
            "Please add files to archive; nothing matched the selected inputs.".to_string()
        }
        ArchiveErrorKind::DestinationUnwritable => {
            format!("Could not write the destination: {}", detail(err))
        }
        ArchiveErrorKind::SourceUnreadable => format!("Could not read an input: {}", detail(err)),
        ArchiveErrorKind::StrategyExhausted => format!(
            "Password-protected ZIP creation needs AES support or an external `zip` program ({})",
            detail(err)
        ),
        ArchiveErrorKind::PasswordUnsupported => format!(
            "Passwords are not supported here: {}",
            detail(err)
        ),
        ArchiveErrorKind::PasswordRequired => {
            "This archive is encrypted. Please use a password-capable tool to extract it.".to_string()
        }
        ArchiveErrorKind::CorruptArchive => format!("Could not read archive: {}", detail(err)),
        ArchiveErrorKind::NotFound => format!("Archive not found: {}", detail(err)),
        ArchiveErrorKind::MemberNotFound => format!("No member named {} in the archive", detail(err)),
        ArchiveErrorKind::OperationUnsupported => detail(err),
        ArchiveErrorKind::Io => format!("I/O error: {}", detail(err)),
    }
}

fn detail(err: &ArchiveError) -> String {
    match err {
        ArchiveError::UnknownFormat(s)
        | ArchiveError::DestinationUnwritable(s)
        | ArchiveError::SourceUnreadable(s)
        | ArchiveError::StrategyExhausted(s)
        | ArchiveError::PasswordUnsupported(s)
        | ArchiveError::PasswordRequired(s)
        | ArchiveError::CorruptArchive(s)
        | ArchiveError::NotFound(s)
        | ArchiveError::MemberNotFound(s)
        | ArchiveError::OperationUnsupported(s) => s.clone(),
        ArchiveError::Io(e) => e.to_string(),
        other => other.to_string(),
    }
}

fn resolve_format(path: &Path, format: Option<&str>) -> Result<&'static FormatDescriptor, ArchiveError> {
    match format {
        Some(id) => FormatRegistry::lookup(id),
        None => FormatRegistry::from_extension(path)
            .ok_or_else(|| ArchiveError::UnknownFormat(path.display().to_string())),
    }
}

fn delete_label(descriptor: &FormatDescriptor) -> &'static str {
    if descriptor.supports_delete {
        DELETE_ENABLED_LABEL
    } else {
        DELETE_DISABLED_LABEL
    }
}

fn kind_label(descriptor: &FormatDescriptor) -> &'static str {
    match descriptor.format {
        FormatId::Zip => "Zip Entry",
        FormatId::Tar | FormatId::TarGz => "Tar Entry",
        FormatId::SevenZ => "7z Entry",
        FormatId::Gzip | FormatId::Bzip2 | FormatId::Xz => "Compressed Stream",
    }
}

fn member_row(descriptor: &FormatDescriptor, member: &ArchiveMember) -> MemberRow {
    MemberRow {
        name: member.name.clone(),
        size_bytes: member.size_bytes,
        size_label: format_size(member.size_bytes),
        kind_label: if member.is_dir() { "Directory" } else { kind_label(descriptor) },
        is_dir: member.is_dir(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_list_formats_labels() {
        let formats = list_formats();
        assert_eq!(formats.len(), FormatRegistry::all().len());

        let tar = formats.iter().find(|f| f.descriptor.id == "tar").unwrap();
        assert_eq!(tar.delete_label, "Delete Selected");
        let zip = formats.iter().find(|f| f.descriptor.id == "zip").unwrap();
        assert_eq!(zip.delete_label, "Delete Disabled (Compressed)");

        let json = serde_json::to_value(&formats[0]).unwrap();
        assert_eq!(json["id"], "zip");
        assert_eq!(json["supportsPassword"], true);
        assert_eq!(json["deleteLabel"], "Delete Disabled (Compressed)");
    }

    #[test]
    fn test_create_list_delete_flow() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("report.txt");
        fs::write(&input, vec![b'x'; 1234]).unwrap();
        let archive = temp.path().join("bundle.tar");
        let processor = ArchiveProcessor::new();

        let created = create_archive(&processor, &CreationRequest::new("tar", &archive).input(&input)).unwrap();
        assert_eq!(created, archive.display().to_string());

        let listing = list_archive(&processor, &created, None).unwrap();
        assert_eq!(listing.format, "tar");
        assert!(listing.can_delete);
        assert_eq!(listing.members.len(), 1);
        assert_eq!(listing.members[0].size_label, "1,234 bytes");
        assert_eq!(listing.members[0].kind_label, "Tar Entry");

        delete_from_archive(&processor, &created, None, "report.txt").unwrap();
        let listing = list_archive(&processor, &created, Some("tar")).unwrap();
        assert!(listing.members.is_empty());
    }

    #[test]
    fn test_unknown_extension_without_format() {
        let processor = ArchiveProcessor::new();
        let err = list_archive(&processor, "/tmp/archive.rar", None).unwrap_err();
        assert!(err.contains("Unknown archive format"));
    }

    #[test]
    fn test_compute_checksum_renders_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("abc.txt");
        fs::write(&path, b"abc").unwrap();

        let result = compute_checksum(path.to_str().unwrap(), 4096).wait().unwrap();
        assert_eq!(
            result.unwrap(),
            "SHA-256: ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_compute_checksum_then_reports_each_file() {
        let dir = TempDir::new().unwrap();
        let abc = dir.path().join("abc.txt");
        std::fs::write(&abc, b"abc").unwrap();
        let missing = dir.path().join("missing.bin");

        let (tx, rx) = flume::unbounded();
        for (index, path) in [&abc, &missing].into_iter().enumerate() {
            let tx = tx.clone();
            compute_checksum_then(path.to_str().unwrap(), 2, move |result| {
                tx.send((index, result)).unwrap();
            });
        }
        drop(tx);

        let mut results: Vec<_> = rx.iter().collect();
        results.sort_by_key(|(index, _)| *index);
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].1.as_deref(),
            Ok("SHA-256: ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert!(results[1].1.is_err());
    }

    #[test]
    fn test_describe_error() {
        let err = ArchiveError::InputCountViolation { format: "gzip".to_string(), count: 2 };
        assert_eq!(describe_error(&err), "gzip allows only ONE input file.");

        let err = ArchiveError::PasswordRequired("secret.zip".to_string());
        assert!(describe_error(&err).contains("password-capable tool"));
        assert!(!describe_error(&err).contains("damaged"));

        let err = ArchiveError::MemberNotFound("ghost.txt".to_string());
        assert_eq!(describe_error(&err), "No member named ghost.txt in the archive");
    }
}
