use std::path::Path;
use std::fs::{self, File};
use std::io;
use sevenz_rust::{Password, SevenZArchiveEntry, SevenZReader, SevenZWriter};
use crate::core::compression::common::{ArchiveHandler, MemberFilter, enclosed_path, ensure_parent};
use crate::core::file_ops::chunker::Chunker;
use crate::models::{
    ArchiveError, ArchiveMember, ArchiverConfig, FormatDescriptor, FormatId, SourceEntry,
};

/// 7z archive handler
///
/// Handles creation, listing and extraction of 7z archives using
/// sevenz-rust. Encrypted archives are reported as `PasswordRequired`.
pub struct SevenZHandler {
    chunker: Chunker,
}

impl SevenZHandler {
    pub fn new() -> Self {
        Self::with_config(&ArchiverConfig::default())
    }

    pub fn with_config(config: &ArchiverConfig) -> Self {
        Self {
            chunker: Chunker::new(config.chunk_size),
        }
    }

    fn open(&self, archive_path: &Path) -> Result<SevenZReader<File>, ArchiveError> {
        let file = File::open(archive_path)
            .map_err(|e| ArchiveError::NotFound(
                format!("Failed to open 7z archive {}: {}", archive_path.display(), e)
            ))?;

        let file_size = file.metadata()
            .map_err(|e| ArchiveError::NotFound(
                format!("Failed to get file metadata: {}", e)
            ))?
            .len();

        SevenZReader::new(file, file_size, Password::empty())
            .map_err(|e| read_error(archive_path, e))
    }
}

impl ArchiveHandler for SevenZHandler {
    fn supports(&self, format: FormatId) -> bool {
        format == FormatId::SevenZ
    }

    /// Uses LZMA2 compression; payloads stream straight from disk
    fn create(
        &self,
        _format: &FormatDescriptor,
        entries: &[SourceEntry],
        output: &Path,
    ) -> Result<(), ArchiveError> {
        let file = File::create(output)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to create 7z file {}: {}", output.display(), e)
            ))?;

        let mut writer = SevenZWriter::new(file)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to create 7z writer: {}", e)
            ))?;

        for entry in entries {
            let reader = self.chunker.open(&entry.path)?;
            writer.push_archive_entry(
                SevenZArchiveEntry::from_path(&entry.path, entry.name.clone()),
                Some(reader),
            )
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to add {} to archive: {}", entry.name, e)
            ))?;
        }

        writer.finish()
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to finalize 7z archive: {}", e)
            ))?;

        Ok(())
    }

    fn list(&self, _format: &FormatDescriptor, archive_path: &Path) -> Result<Vec<ArchiveMember>, ArchiveError> {
        let reader = self.open(archive_path)?;

        let members = reader.archive().files.iter()
            .map(|entry| {
                if entry.is_directory() {
                    ArchiveMember::directory(entry.name())
                } else {
                    ArchiveMember::file(entry.name(), entry.size())
                }
            })
            .collect();

        Ok(members)
    }

    fn extract(
        &self,
        _format: &FormatDescriptor,
        archive_path: &Path,
        dest_dir: &Path,
        keep: MemberFilter<'_>,
    ) -> Result<Vec<String>, ArchiveError> {
        let mut reader = self.open(archive_path)?;
        let mut extracted = Vec::new();
        // First destination failure; sevenz-rust errors lose our variant
        let mut failure: Option<ArchiveError> = None;

        let result = reader.for_each_entries(|entry, data| {
            let name = entry.name().to_string();

            let output_path = match enclosed_path(dest_dir, &name) {
                Some(path) if keep(&name) => path,
                Some(_) => {
                    io::copy(data, &mut io::sink()).map_err(sevenz_rust::Error::io)?;
                    return Ok(true);
                }
                None => {
                    log::warn!("skipping 7z member with unsafe name {:?}", name);
                    io::copy(data, &mut io::sink()).map_err(sevenz_rust::Error::io)?;
                    return Ok(true);
                }
            };

            let written = if entry.is_directory() {
                fs::create_dir_all(&output_path)
                    .map_err(|e| ArchiveError::DestinationUnwritable(
                        format!("Failed to create directory {}: {}", output_path.display(), e)
                    ))
            } else {
                ensure_parent(&output_path)
                    .and_then(|_| File::create(&output_path)
                        .map_err(|e| ArchiveError::DestinationUnwritable(
                            format!("Failed to create output file {}: {}", output_path.display(), e)
                        )))
                    .and_then(|mut out| self.chunker.copy_payload(&name, data, &mut out).map(drop))
            };

            match written {
                Ok(()) => {
                    extracted.push(name);
                    Ok(true)
                }
                Err(e) => {
                    failure = Some(e);
                    Ok(false)
                }
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }
        result.map_err(|e| read_error(archive_path, e))?;

        Ok(extracted)
    }
}

impl Default for SevenZHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn read_error(archive_path: &Path, err: sevenz_rust::Error) -> ArchiveError {
    match err {
        sevenz_rust::Error::PasswordRequired | sevenz_rust::Error::MaybeBadPassword(_) => {
            ArchiveError::PasswordRequired(format!("{} is encrypted", archive_path.display()))
        }
        other => ArchiveError::CorruptArchive(format!("{}: {}", archive_path.display(), other)),
    }
}
