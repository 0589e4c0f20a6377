use std::path::{Path, PathBuf};
use serde::Serialize;
use crate::models::ArchiveError;

/// Concrete encoding behind a format descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormatId {
    Zip,
    Tar,
    TarGz,
    SevenZ,
    Gzip,
    Bzip2,
    Xz,
}

/// Whether a format holds a member table or a single compressed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormatKind {
    SingleStreamCompression,
    MultiMemberArchive,
}

/// Capability record for one supported format
///
/// Instances only live in the static registry table; callers get
/// `&'static` references and never build their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDescriptor {
    pub id: &'static str,
    #[serde(skip)]
    pub format: FormatId,
    pub file_extension: &'static str,
    pub kind: FormatKind,
    pub supports_multiple_inputs: bool,
    pub supports_append: bool,
    pub supports_delete: bool,
    pub supports_password: bool,
}

impl FormatDescriptor {
    pub fn is_single_stream(&self) -> bool {
        self.kind == FormatKind::SingleStreamCompression
    }
}

const fn multi_member(
    id: &'static str,
    format: FormatId,
    file_extension: &'static str,
    supports_append: bool,
    supports_delete: bool,
    supports_password: bool,
) -> FormatDescriptor {
    FormatDescriptor {
        id,
        format,
        file_extension,
        kind: FormatKind::MultiMemberArchive,
        supports_multiple_inputs: true,
        supports_append,
        supports_delete,
        supports_password,
    }
}

const fn single_stream(id: &'static str, format: FormatId, file_extension: &'static str) -> FormatDescriptor {
    FormatDescriptor {
        id,
        format,
        file_extension,
        kind: FormatKind::SingleStreamCompression,
        supports_multiple_inputs: false,
        supports_append: false,
        supports_delete: false,
        supports_password: false,
    }
}

static FORMATS: [FormatDescriptor; 7] = [
    multi_member("zip", FormatId::Zip, ".zip", true, false, true),
    multi_member("tar", FormatId::Tar, ".tar", true, true, false),
    multi_member("tar.gz", FormatId::TarGz, ".tar.gz", false, false, false),
    multi_member("7z", FormatId::SevenZ, ".7z", false, false, false),
    single_stream("gzip", FormatId::Gzip, ".gz"),
    single_stream("bzip2", FormatId::Bzip2, ".bz2"),
    single_stream("xz", FormatId::Xz, ".xz"),
];

/// Read-only table of supported formats
pub struct FormatRegistry;

impl FormatRegistry {
    /// Every registered format, in display order
    pub fn all() -> &'static [FormatDescriptor] {
        &FORMATS
    }

    /// Resolve a format identifier (case-insensitive, with a few aliases)
    pub fn lookup(format_id: &str) -> Result<&'static FormatDescriptor, ArchiveError> {
        let normalized = format_id.trim().to_ascii_lowercase();
        let canonical = match normalized.as_str() {
            "tgz" => "tar.gz",
            "gz" => "gzip",
            "bz2" => "bzip2",
            "sevenz" => "7z",
            other => other,
        };

        FORMATS
            .iter()
            .find(|d| d.id == canonical)
            .ok_or_else(|| ArchiveError::UnknownFormat(format_id.to_string()))
    }

    /// Reject more than one input for formats that take a single stream
    pub fn validate_input_count(
        descriptor: &FormatDescriptor,
        input_paths: &[PathBuf],
    ) -> Result<(), ArchiveError> {
        if !descriptor.supports_multiple_inputs && input_paths.len() > 1 {
            return Err(ArchiveError::InputCountViolation {
                format: descriptor.id.to_string(),
                count: input_paths.len(),
            });
        }
        Ok(())
    }

    /// Guess a format from a file name's extension
    ///
    /// Only used to pre-fill a format choice for the user. The archive
    /// operations themselves always work from the declared format.
    pub fn from_extension(path: &Path) -> Option<&'static FormatDescriptor> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tgz") {
            return Self::lookup("tar.gz").ok();
        }
        // Longest extension first so ".tar.gz" wins over ".gz"
        let mut candidates: Vec<&'static FormatDescriptor> = FORMATS.iter().collect();
        candidates.sort_by_key(|d| std::cmp::Reverse(d.file_extension.len()));
        candidates.into_iter().find(|d| name.ends_with(d.file_extension))
    }
}
