// Archive compression modules
pub mod common;
pub mod password;
pub mod stream_handler;
pub mod tar_handler;
pub mod zip_handler;

#[path = "7z_handler.rs"]
pub mod sevenz_handler;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::core::file_ops::scanner::{base_name, InputScanner};
use crate::core::file_ops::temp_manager::StagingArea;
use crate::models::{
    is_excluded, ArchiveError, ArchiveHandle, ArchiveMember, ArchiverConfig, CreationRequest,
    ExtractionRequest, FormatDescriptor, FormatRegistry, SourceEntry,
};
use common::ArchiveHandler;
use password::EncryptionBackend;
use sevenz_handler::SevenZHandler;
use stream_handler::StreamHandler;
use tar_handler::TarHandler;
use zip_handler::ZipHandler;

/// Archive processor that orchestrates every archive operation
///
/// Workflow:
/// 1. Resolve the declared format through the registry (never the file
///    extension)
/// 2. Check the format's capabilities before touching the filesystem
/// 3. Dispatch to the handler that encodes the format
/// 4. Build new artifacts in a staging area and rename them into place
pub struct ArchiveProcessor {
    handlers: Vec<Arc<dyn ArchiveHandler>>,
    backends: Vec<Box<dyn EncryptionBackend>>,
    config: ArchiverConfig,
}

impl ArchiveProcessor {
    /// Create a new archive processor with all supported handlers
    pub fn new() -> Self {
        Self::with_config(ArchiverConfig::default())
    }

    pub fn with_config(config: ArchiverConfig) -> Self {
        let handlers: Vec<Arc<dyn ArchiveHandler>> = vec![
            Arc::new(ZipHandler::with_config(&config)),
            Arc::new(TarHandler::with_config(&config)),
            Arc::new(SevenZHandler::with_config(&config)),
            Arc::new(StreamHandler::with_config(&config)),
        ];
        let backends = password::default_backends(&config);

        Self {
            handlers,
            backends,
            config,
        }
    }

    /// Replace the password strategy chain
    pub fn with_encryption_backends(mut self, backends: Vec<Box<dyn EncryptionBackend>>) -> Self {
        self.backends = backends;
        self
    }

    pub fn config(&self) -> &ArchiverConfig {
        &self.config
    }

    fn get_handler(&self, format: &FormatDescriptor) -> Result<Arc<dyn ArchiveHandler>, ArchiveError> {
        self.handlers
            .iter()
            .find(|h| h.supports(format.format))
            .map(Arc::clone)
            .ok_or_else(|| ArchiveError::OperationUnsupported(
                format!("No handler for {} archives", format.id)
            ))
    }

    /// Create a new archive from files and directories
    ///
    /// Nothing appears at the destination unless the whole archive was
    /// written.
    pub fn create(&self, request: &CreationRequest) -> Result<ArchiveHandle, ArchiveError> {
        let format = FormatRegistry::lookup(&request.format)?;
        FormatRegistry::validate_input_count(format, &request.input_paths)?;

        let password = request.effective_password();
        if password.is_some() && !format.supports_password {
            return Err(ArchiveError::PasswordUnsupported(
                format!("{} archives cannot be password protected", format.id)
            ));
        }

        let entries = InputScanner::new(request.recursive)
            .with_exclusion(request.exclusion_suffix.as_deref())
            .scan(&request.input_paths)?;

        if entries.is_empty() {
            return Err(ArchiveError::EmptyInput);
        }
        if format.is_single_stream() && entries.len() > 1 {
            return Err(ArchiveError::InputCountViolation {
                format: format.id.to_string(),
                count: entries.len(),
            });
        }

        let handler = self.get_handler(format)?;
        let staging = StagingArea::beside(&request.destination)?;

        match password {
            Some(password) => password::write_with_first_available(
                &self.backends,
                &entries,
                password,
                staging.artifact_path(),
            )?,
            None => handler.create(format, &entries, staging.artifact_path())?,
        }

        staging.commit(&request.destination)?;
        log::debug!(
            "created {} archive {} with {} members",
            format.id,
            request.destination.display(),
            entries.len()
        );

        Ok(ArchiveHandle::new(&request.destination, format))
    }

    /// List members in the archive's own order
    pub fn list(&self, archive_path: &Path, format_id: &str) -> Result<Vec<ArchiveMember>, ArchiveError> {
        let format = FormatRegistry::lookup(format_id)?;
        ensure_exists(archive_path)?;

        let handler = self.get_handler(format)?;
        handler.list(format, archive_path)
    }

    /// Extract every member not matching the exclusion suffix
    ///
    /// Returns the extracted member names. A failure part-way leaves the
    /// members already written in place.
    pub fn extract(&self, request: &ExtractionRequest) -> Result<Vec<String>, ArchiveError> {
        let format = FormatRegistry::lookup(&request.format)?;
        ensure_exists(&request.archive_path)?;

        fs::create_dir_all(&request.destination_dir)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to create {}: {}", request.destination_dir.display(), e)
            ))?;

        let suffix = request.exclusion_suffix.as_deref();
        let keep = |name: &str| !is_excluded(name, suffix);

        let handler = self.get_handler(format)?;
        let extracted = handler.extract(format, &request.archive_path, &request.destination_dir, &keep)?;
        log::debug!(
            "extracted {} members from {}",
            extracted.len(),
            request.archive_path.display()
        );

        Ok(extracted)
    }

    /// Add files to an existing archive under their base names
    pub fn append(
        &self,
        archive_path: &Path,
        format_id: &str,
        new_files: &[PathBuf],
    ) -> Result<(), ArchiveError> {
        let format = FormatRegistry::lookup(format_id)?;
        if !format.supports_append {
            return Err(ArchiveError::OperationUnsupported(
                format!("{} archives cannot be appended to", format.id)
            ));
        }
        if new_files.is_empty() {
            return Err(ArchiveError::EmptyInput);
        }
        ensure_exists(archive_path)?;

        let entries = new_files
            .iter()
            .map(|path| {
                if !path.is_file() {
                    return Err(ArchiveError::SourceUnreadable(
                        format!("{} is not a readable file", path.display())
                    ));
                }
                Ok(SourceEntry::new(base_name(path)?, path))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let handler = self.get_handler(format)?;
        handler.append(format, archive_path, &entries)
    }

    /// Remove one member by rewriting the archive without it
    ///
    /// The original is replaced in one rename; on any failure it is left
    /// byte-identical.
    pub fn delete_member(
        &self,
        archive_path: &Path,
        format_id: &str,
        member_name: &str,
    ) -> Result<(), ArchiveError> {
        let staging = self.stage_without(archive_path, format_id, member_name)?;
        staging.commit(archive_path)?;
        log::debug!("deleted {} from {}", member_name, archive_path.display());
        Ok(())
    }

    /// Write the reduced archive into a staging area, without committing it
    fn stage_without(
        &self,
        archive_path: &Path,
        format_id: &str,
        member_name: &str,
    ) -> Result<StagingArea, ArchiveError> {
        let format = FormatRegistry::lookup(format_id)?;
        if !format.supports_delete {
            return Err(ArchiveError::OperationUnsupported(
                format!("Members cannot be deleted from {} archives", format.id)
            ));
        }
        ensure_exists(archive_path)?;

        let handler = self.get_handler(format)?;
        let members = handler.list(format, archive_path)?;
        if !members.iter().any(|m| m.name == member_name) {
            return Err(ArchiveError::MemberNotFound(member_name.to_string()));
        }

        let staging = StagingArea::beside(archive_path)?;
        handler.repack_without(format, archive_path, member_name, staging.artifact_path())?;
        Ok(staging)
    }
}

impl Default for ArchiveProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_exists(archive_path: &Path) -> Result<(), ArchiveError> {
    if archive_path.is_file() {
        Ok(())
    } else {
        Err(ArchiveError::NotFound(archive_path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_files(dir: &Path) -> PathBuf {
        let root = dir.join("project");
        fs::create_dir_all(root.join("c")).unwrap();
        fs::write(root.join("a.txt"), b"alpha").unwrap();
        fs::write(root.join("b.tmp"), b"scratch").unwrap();
        fs::write(root.join("c/d.tmp"), b"nested scratch").unwrap();
        fs::write(root.join("c/e.txt"), vec![7u8; 10_000]).unwrap();
        root
    }

    fn names(members: &[ArchiveMember]) -> Vec<&str> {
        members.iter().map(|m| m.name.as_str()).collect()
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut entries: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn test_zip_and_tar_round_trip() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let processor = ArchiveProcessor::new();

        for format in ["zip", "tar", "tar.gz", "7z"] {
            let destination = temp.path().join(format!("out.{}", format));
            let request = CreationRequest::new(format, &destination).input(&root).recursive(true);
            let handle = processor.create(&request).unwrap();
            assert_eq!(handle.path(), destination.as_path());

            let members = processor.list(&destination, format).unwrap();
            assert_eq!(
                names(&members),
                vec!["project/a.txt", "project/b.tmp", "project/c/d.tmp", "project/c/e.txt"],
                "{}",
                format
            );

            let out = temp.path().join(format!("extract_{}", format));
            processor.extract(&ExtractionRequest::new(&destination, format, &out)).unwrap();
            for name in ["a.txt", "b.tmp", "c/d.tmp", "c/e.txt"] {
                assert_eq!(
                    fs::read(out.join("project").join(name)).unwrap(),
                    fs::read(root.join(name)).unwrap(),
                    "{} in {}",
                    name,
                    format
                );
            }
        }
    }

    #[test]
    fn test_list_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let destination = temp.path().join("out.tar");
        let processor = ArchiveProcessor::new();
        processor.create(&CreationRequest::new("tar", &destination).input(&root).recursive(true)).unwrap();

        let first = processor.list(&destination, "tar").unwrap();
        let second = processor.list(&destination, "tar").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_creation_exclusion() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        fs::remove_file(root.join("c/e.txt")).unwrap();
        let destination = temp.path().join("out.zip");
        let processor = ArchiveProcessor::new();

        let request = CreationRequest::new("zip", &destination)
            .input(&root)
            .recursive(true)
            .exclude_suffix(".tmp");
        processor.create(&request).unwrap();

        let members = processor.list(&destination, "zip").unwrap();
        assert_eq!(names(&members), vec!["project/a.txt"]);
    }

    #[test]
    fn test_extraction_exclusion() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let destination = temp.path().join("out.tar");
        let processor = ArchiveProcessor::new();
        processor.create(&CreationRequest::new("tar", &destination).input(&root).recursive(true)).unwrap();

        let out = temp.path().join("extracted");
        let request = ExtractionRequest::new(&destination, "tar", &out).exclude_suffix(".tmp");
        let extracted = processor.extract(&request).unwrap();

        assert_eq!(extracted, vec!["project/a.txt", "project/c/e.txt"]);
        assert!(!out.join("project/b.tmp").exists());
        assert!(!out.join("project/c/d.tmp").exists());
    }

    #[test]
    fn test_non_recursive_takes_top_level_only() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let destination = temp.path().join("flat.tar");
        let processor = ArchiveProcessor::new();

        processor.create(&CreationRequest::new("tar", &destination).input(&root)).unwrap();

        let members = processor.list(&destination, "tar").unwrap();
        assert_eq!(names(&members), vec!["project/a.txt", "project/b.tmp"]);
    }

    #[test]
    fn test_single_stream_rejects_multiple_inputs() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let destination = temp.path().join("out.gz");
        let processor = ArchiveProcessor::new();

        let request = CreationRequest::new("gzip", &destination)
            .input(root.join("a.txt"))
            .input(root.join("b.tmp"));
        assert!(matches!(
            processor.create(&request),
            Err(ArchiveError::InputCountViolation { count: 2, .. })
        ));

        // One directory input that resolves to several files
        let request = CreationRequest::new("xz", &destination).input(&root);
        assert!(matches!(
            processor.create(&request),
            Err(ArchiveError::InputCountViolation { .. })
        ));

        assert!(!destination.exists());
        assert_eq!(dir_entries(temp.path()), vec!["project"]);
    }

    #[test]
    fn test_single_stream_round_trip() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let destination = temp.path().join("e.txt.bz2");
        let processor = ArchiveProcessor::new();

        processor.create(&CreationRequest::new("bzip2", &destination).input(root.join("c/e.txt"))).unwrap();

        let members = processor.list(&destination, "bzip2").unwrap();
        assert_eq!(members, vec![ArchiveMember::file("e.txt", 10_000)]);

        let out = temp.path().join("out");
        processor.extract(&ExtractionRequest::new(&destination, "bzip2", &out)).unwrap();
        assert_eq!(fs::read(out.join("e.txt")).unwrap(), vec![7u8; 10_000]);
    }

    #[test]
    fn test_password_on_unsupported_format() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let destination = temp.path().join("out.tar");
        let processor = ArchiveProcessor::new();

        let request = CreationRequest::new("tar", &destination).input(&root).password("secret");
        assert!(matches!(processor.create(&request), Err(ArchiveError::PasswordUnsupported(_))));

        // An empty password is no password
        let request = CreationRequest::new("tar", &destination).input(&root).password("");
        processor.create(&request).unwrap();
        assert!(destination.exists());
    }

    #[test]
    fn test_password_chain_without_backends_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let destination = temp.path().join("secret.zip");
        let processor = ArchiveProcessor::new().with_encryption_backends(Vec::new());

        let request = CreationRequest::new("zip", &destination).input(&root).password("secret");
        assert!(matches!(processor.create(&request), Err(ArchiveError::StrategyExhausted(_))));

        assert!(!destination.exists());
        assert_eq!(dir_entries(temp.path()), vec!["project"]);
    }

    #[cfg(feature = "aes")]
    #[test]
    fn test_password_protected_zip_requires_password() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let destination = temp.path().join("secret.zip");
        let processor = ArchiveProcessor::new();

        let request = CreationRequest::new("zip", &destination).input(root.join("a.txt")).password("secret");
        processor.create(&request).unwrap();

        let members = processor.list(&destination, "zip").unwrap();
        assert_eq!(names(&members), vec!["a.txt"]);

        let out = temp.path().join("out");
        let result = processor.extract(&ExtractionRequest::new(&destination, "zip", &out));
        assert!(matches!(result, Err(ArchiveError::PasswordRequired(_))));
        assert!(!out.join("a.txt").exists());
    }

    #[test]
    fn test_empty_input() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("only_tmp");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("x.tmp"), b"x").unwrap();
        let destination = temp.path().join("out.zip");
        let processor = ArchiveProcessor::new();

        let request = CreationRequest::new("zip", &destination).input(&root).exclude_suffix(".tmp");
        assert!(matches!(processor.create(&request), Err(ArchiveError::EmptyInput)));
        assert!(!destination.exists());
    }

    #[test]
    fn test_missing_input_leaves_no_artifact() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("out.zip");
        let processor = ArchiveProcessor::new();

        let request = CreationRequest::new("zip", &destination).input(temp.path().join("missing.txt"));
        assert!(matches!(processor.create(&request), Err(ArchiveError::SourceUnreadable(_))));
        assert!(!destination.exists());
    }

    #[test]
    fn test_unknown_format() {
        let processor = ArchiveProcessor::new();
        let result = processor.list(Path::new("archive.rar"), "rar");
        assert!(matches!(result, Err(ArchiveError::UnknownFormat(_))));
    }

    #[test]
    fn test_list_missing_archive() {
        let temp = TempDir::new().unwrap();
        let processor = ArchiveProcessor::new();
        let result = processor.list(&temp.path().join("nope.zip"), "zip");
        assert!(matches!(result, Err(ArchiveError::NotFound(_))));
    }

    #[test]
    fn test_tar_delete_member() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let archive = temp.path().join("out.tar");
        let processor = ArchiveProcessor::new();
        processor.create(&CreationRequest::new("tar", &archive).input(&root).recursive(true)).unwrap();

        processor.delete_member(&archive, "tar", "project/b.tmp").unwrap();

        let members = processor.list(&archive, "tar").unwrap();
        assert_eq!(names(&members), vec!["project/a.txt", "project/c/d.tmp", "project/c/e.txt"]);

        let out = temp.path().join("out");
        processor.extract(&ExtractionRequest::new(&archive, "tar", &out)).unwrap();
        for name in ["a.txt", "c/d.tmp", "c/e.txt"] {
            assert_eq!(
                fs::read(out.join("project").join(name)).unwrap(),
                fs::read(root.join(name)).unwrap()
            );
        }
        assert_eq!(dir_entries(temp.path()), vec!["out", "out.tar", "project"]);
    }

    #[test]
    fn test_delete_aborted_before_rename_keeps_original() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let archive = temp.path().join("out.tar");
        let processor = ArchiveProcessor::new();
        processor.create(&CreationRequest::new("tar", &archive).input(&root).recursive(true)).unwrap();
        let before = fs::read(&archive).unwrap();

        let staging = processor.stage_without(&archive, "tar", "project/a.txt").unwrap();
        assert!(staging.artifact_path().is_file());
        drop(staging);

        assert_eq!(fs::read(&archive).unwrap(), before);
        assert_eq!(dir_entries(temp.path()), vec!["out.tar", "project"]);
    }

    #[test]
    fn test_delete_missing_member() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let archive = temp.path().join("out.tar");
        let processor = ArchiveProcessor::new();
        processor.create(&CreationRequest::new("tar", &archive).input(&root)).unwrap();
        let before = fs::read(&archive).unwrap();

        let result = processor.delete_member(&archive, "tar", "project/ghost.txt");
        assert!(matches!(result, Err(ArchiveError::MemberNotFound(_))));
        assert_eq!(fs::read(&archive).unwrap(), before);
    }

    #[test]
    fn test_delete_unsupported_format_leaves_archive() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let processor = ArchiveProcessor::new();

        for format in ["zip", "tar.gz", "7z"] {
            let archive = temp.path().join(format!("out.{}", format));
            processor.create(&CreationRequest::new(format, &archive).input(&root)).unwrap();
            let before = fs::read(&archive).unwrap();

            let result = processor.delete_member(&archive, format, "project/a.txt");
            assert!(matches!(result, Err(ArchiveError::OperationUnsupported(_))), "{}", format);
            assert_eq!(fs::read(&archive).unwrap(), before);
        }

        for format in ["gzip", "bzip2", "xz"] {
            let archive = temp.path().join(format!("a.txt.{}", format));
            processor
                .create(&CreationRequest::new(format, &archive).input(root.join("a.txt")))
                .unwrap();
            let before = fs::read(&archive).unwrap();

            let result = processor.delete_member(&archive, format, "a.txt");
            assert!(matches!(result, Err(ArchiveError::OperationUnsupported(_))), "{}", format);
            assert_eq!(fs::read(&archive).unwrap(), before);
        }
    }

    #[test]
    fn test_append() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let extra = temp.path().join("extra.txt");
        fs::write(&extra, b"late addition").unwrap();
        let processor = ArchiveProcessor::new();

        for format in ["zip", "tar"] {
            let archive = temp.path().join(format!("out.{}", format));
            processor.create(&CreationRequest::new(format, &archive).input(root.join("a.txt"))).unwrap();

            processor.append(&archive, format, &[extra.clone()]).unwrap();

            let members = processor.list(&archive, format).unwrap();
            assert_eq!(names(&members), vec!["a.txt", "extra.txt"], "{}", format);
        }
    }

    #[test]
    fn test_append_checks() {
        let temp = TempDir::new().unwrap();
        let root = create_test_files(temp.path());
        let archive = temp.path().join("out.tar");
        let processor = ArchiveProcessor::new();
        processor.create(&CreationRequest::new("tar", &archive).input(root.join("a.txt"))).unwrap();

        assert!(matches!(processor.append(&archive, "tar", &[]), Err(ArchiveError::EmptyInput)));
        assert!(matches!(
            processor.append(&archive, "tar", &[root.clone()]),
            Err(ArchiveError::SourceUnreadable(_))
        ));
        assert!(matches!(
            processor.append(&archive, "gzip", &[root.join("a.txt")]),
            Err(ArchiveError::OperationUnsupported(_))
        ));
    }
}
