use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::models::FormatDescriptor;

/// Kind of an entry inside a multi-member archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MemberKind {
    File,
    Directory,
}

/// One entry of an opened archive, as reported by `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMember {
    /// Relative path inside the archive
    pub name: String,
    pub size_bytes: u64,
    pub kind: MemberKind,
}

impl ArchiveMember {
    pub fn file(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            kind: MemberKind::File,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes: 0,
            kind: MemberKind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == MemberKind::Directory
    }
}

/// An archive artifact on disk together with its declared format
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveHandle {
    pub path: PathBuf,
    pub format: &'static FormatDescriptor,
}

impl ArchiveHandle {
    pub fn new(path: impl Into<PathBuf>, format: &'static FormatDescriptor) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parameters of a `create` call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationRequest {
    /// Format identifier, resolved through the registry
    pub format: String,
    pub destination: PathBuf,
    pub input_paths: Vec<PathBuf>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub exclusion_suffix: Option<String>,
}

impl CreationRequest {
    pub fn new(format: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            format: format.into(),
            destination: destination.into(),
            input_paths: Vec::new(),
            recursive: false,
            password: None,
            exclusion_suffix: None,
        }
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_paths.push(path.into());
        self
    }

    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.input_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn exclude_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.exclusion_suffix = Some(suffix.into());
        self
    }

    /// Password to apply, treating an empty string as none
    pub fn effective_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

/// Parameters of an `extract` call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    pub archive_path: PathBuf,
    pub format: String,
    pub destination_dir: PathBuf,
    #[serde(default)]
    pub exclusion_suffix: Option<String>,
}

impl ExtractionRequest {
    pub fn new(
        archive_path: impl Into<PathBuf>,
        format: impl Into<String>,
        destination_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            archive_path: archive_path.into(),
            format: format.into(),
            destination_dir: destination_dir.into(),
            exclusion_suffix: None,
        }
    }

    pub fn exclude_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.exclusion_suffix = Some(suffix.into());
        self
    }
}

/// A resolved input file and the member name it will get
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Name inside the archive, always `/`-separated
    pub name: String,
    /// Location on disk
    pub path: PathBuf,
}

impl SourceEntry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// True when `name` ends with a non-empty exclusion suffix
pub fn is_excluded(name: &str, exclusion_suffix: Option<&str>) -> bool {
    match exclusion_suffix {
        Some(suffix) if !suffix.is_empty() => name.ends_with(suffix),
        _ => false,
    }
}
