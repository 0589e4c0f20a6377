use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use tar::{Archive, Builder, EntryType, Header};
use crate::core::compression::common::{ArchiveHandler, MemberFilter, enclosed_path, ensure_parent};
use crate::core::file_ops::chunker::Chunker;
use crate::models::{
    ArchiveError, ArchiveMember, ArchiverConfig, FormatDescriptor, FormatId, SourceEntry,
};

const BLOCK_SIZE: u64 = 512;

/// TAR and gzip-compressed TAR handler
///
/// Plain TAR supports in-place append (new entries overwrite the
/// end-of-archive marker) and member deletion by repacking. `tar.gz` is a
/// single gzip stream over the whole archive, so it only supports create,
/// list and extract.
pub struct TarHandler {
    chunker: Chunker,
}

impl TarHandler {
    pub fn new() -> Self {
        Self::with_config(&ArchiverConfig::default())
    }

    pub fn with_config(config: &ArchiverConfig) -> Self {
        Self {
            chunker: Chunker::new(config.chunk_size),
        }
    }

    fn open_reader(&self, format: &FormatDescriptor, archive_path: &Path) -> Result<Box<dyn Read>, ArchiveError> {
        let file = File::open(archive_path)
            .map_err(|e| ArchiveError::NotFound(
                format!("Failed to open TAR archive {}: {}", archive_path.display(), e)
            ))?;
        let reader = BufReader::with_capacity(self.chunker.chunk_size(), file);

        Ok(match format.format {
            FormatId::TarGz => Box::new(GzDecoder::new(reader)),
            _ => Box::new(reader),
        })
    }

    fn append_entries<W: Write>(&self, builder: &mut Builder<W>, entries: &[SourceEntry]) -> Result<(), ArchiveError> {
        for entry in entries {
            let metadata = fs::metadata(&entry.path)
                .map_err(|e| ArchiveError::SourceUnreadable(
                    format!("{}: {}", entry.path.display(), e)
                ))?;

            let mut header = Header::new_gnu();
            header.set_metadata(&metadata);
            header.set_entry_type(EntryType::Regular);
            header.set_size(metadata.len());

            let reader = self.chunker.open(&entry.path)?;
            builder.append_data(&mut header, &entry.name, reader)
                .map_err(|e| ArchiveError::DestinationUnwritable(
                    format!("Failed to add {} to archive: {}", entry.name, e)
                ))?;
        }
        Ok(())
    }
}

impl ArchiveHandler for TarHandler {
    fn supports(&self, format: FormatId) -> bool {
        matches!(format, FormatId::Tar | FormatId::TarGz)
    }

    fn create(
        &self,
        format: &FormatDescriptor,
        entries: &[SourceEntry],
        output: &Path,
    ) -> Result<(), ArchiveError> {
        let file = File::create(output)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to create TAR file {}: {}", output.display(), e)
            ))?;

        let finish_error = |e: std::io::Error| ArchiveError::DestinationUnwritable(
            format!("Failed to finalize {}: {}", output.display(), e)
        );

        match format.format {
            FormatId::TarGz => {
                let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
                self.append_entries(&mut builder, entries)?;
                builder.into_inner()
                    .and_then(GzEncoder::finish)
                    .map_err(finish_error)?;
            }
            _ => {
                let mut builder = Builder::new(file);
                self.append_entries(&mut builder, entries)?;
                builder.into_inner().map_err(finish_error)?;
            }
        }

        Ok(())
    }

    fn list(&self, format: &FormatDescriptor, archive_path: &Path) -> Result<Vec<ArchiveMember>, ArchiveError> {
        let mut archive = Archive::new(self.open_reader(format, archive_path)?);
        let mut members = Vec::new();

        for entry in archive.entries().map_err(|e| corrupt(archive_path, e))? {
            let entry = entry.map_err(|e| corrupt(archive_path, e))?;
            let name = entry_name(&entry, archive_path)?;

            let member = if entry.header().entry_type().is_dir() {
                ArchiveMember::directory(name)
            } else {
                ArchiveMember::file(name, entry.size())
            };
            members.push(member);
        }

        Ok(members)
    }

    /// Materializes regular files and directories through the chunked copy.
    /// A payload shorter than its header size means the archive is damaged.
    fn extract(
        &self,
        format: &FormatDescriptor,
        archive_path: &Path,
        dest_dir: &Path,
        keep: MemberFilter<'_>,
    ) -> Result<Vec<String>, ArchiveError> {
        let mut archive = Archive::new(self.open_reader(format, archive_path)?);

        let mut extracted = Vec::new();
        for entry in archive.entries().map_err(|e| corrupt(archive_path, e))? {
            let mut entry = entry.map_err(|e| corrupt(archive_path, e))?;
            let name = entry_name(&entry, archive_path)?;
            if !keep(&name) {
                continue;
            }

            let output_path = match enclosed_path(dest_dir, &name) {
                Some(path) => path,
                None => {
                    log::warn!("skipping TAR member with unsafe name {:?}", name);
                    continue;
                }
            };

            let entry_type = entry.header().entry_type();
            if entry_type.is_dir() {
                fs::create_dir_all(&output_path)
                    .map_err(|e| ArchiveError::DestinationUnwritable(
                        format!("Failed to create directory {}: {}", output_path.display(), e)
                    ))?;
            } else if entry_type.is_file() || entry_type.is_contiguous() {
                ensure_parent(&output_path)?;
                let mut out = File::create(&output_path)
                    .map_err(|e| ArchiveError::DestinationUnwritable(
                        format!("Failed to create output file {}: {}", output_path.display(), e)
                    ))?;

                let expected = entry.size();
                let written = self.chunker.copy_payload(&name, &mut entry, &mut out)?;
                if written != expected {
                    return Err(ArchiveError::CorruptArchive(format!(
                        "{}: {} is truncated ({} of {} bytes)",
                        archive_path.display(), name, written, expected
                    )));
                }

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    if let Ok(mode) = entry.header().mode() {
                        fs::set_permissions(&output_path, fs::Permissions::from_mode(mode & 0o777))
                            .map_err(|e| ArchiveError::DestinationUnwritable(
                                format!("Failed to set permissions: {}", e)
                            ))?;
                    }
                }
            } else {
                log::warn!("skipping TAR member {:?} of type {:?}", name, entry_type);
                continue;
            }

            extracted.push(name);
        }

        Ok(extracted)
    }

    /// Appends after the last entry, overwriting the end-of-archive marker
    fn append(
        &self,
        format: &FormatDescriptor,
        archive_path: &Path,
        entries: &[SourceEntry],
    ) -> Result<(), ArchiveError> {
        if format.format != FormatId::Tar {
            return Err(ArchiveError::OperationUnsupported(
                format!("{} archives cannot be appended to", format.id)
            ));
        }

        let end = end_of_entries(archive_path)?;

        let mut file = OpenOptions::new()
            .write(true)
            .open(archive_path)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to open {} for writing: {}", archive_path.display(), e)
            ))?;
        file.set_len(end)
            .and_then(|_| file.seek(SeekFrom::Start(end)))
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to position {}: {}", archive_path.display(), e)
            ))?;

        let mut builder = Builder::new(file);
        self.append_entries(&mut builder, entries)?;
        builder.into_inner()
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to finalize {}: {}", archive_path.display(), e)
            ))?;

        Ok(())
    }

    /// Stream every entry except `member_name` into a new TAR at `output`
    fn repack_without(
        &self,
        format: &FormatDescriptor,
        archive_path: &Path,
        member_name: &str,
        output: &Path,
    ) -> Result<(), ArchiveError> {
        if format.format != FormatId::Tar {
            return Err(ArchiveError::OperationUnsupported(
                format!("Members cannot be deleted from {} archives", format.id)
            ));
        }

        let mut archive = Archive::new(self.open_reader(format, archive_path)?);
        let out = File::create(output)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to create {}: {}", output.display(), e)
            ))?;
        let mut builder = Builder::new(out);

        for entry in archive.entries().map_err(|e| corrupt(archive_path, e))? {
            let mut entry = entry.map_err(|e| corrupt(archive_path, e))?;
            let name = entry_name(&entry, archive_path)?;
            if name == member_name {
                continue;
            }

            let mut header = entry.header().clone();
            builder.append_data(&mut header, &name, &mut entry)
                .map_err(|e| ArchiveError::DestinationUnwritable(
                    format!("Failed to copy {}: {}", name, e)
                ))?;
        }

        builder.into_inner()
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to finalize {}: {}", output.display(), e)
            ))?;

        Ok(())
    }
}

impl Default for TarHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte offset just past the last entry's padded payload
fn end_of_entries(archive_path: &Path) -> Result<u64, ArchiveError> {
    let file = File::open(archive_path)
        .map_err(|e| ArchiveError::NotFound(
            format!("{}: {}", archive_path.display(), e)
        ))?;
    let mut archive = Archive::new(BufReader::new(file));

    let mut end = 0u64;
    for entry in archive.entries().map_err(|e| corrupt(archive_path, e))? {
        let entry = entry.map_err(|e| corrupt(archive_path, e))?;
        let stored = entry.header().entry_size().map_err(|e| corrupt(archive_path, e))?;
        end = entry.raw_file_position() + stored.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    }

    Ok(end)
}

fn entry_name<R: Read>(entry: &tar::Entry<'_, R>, archive_path: &Path) -> Result<String, ArchiveError> {
    entry.path()
        .map(|p| p.to_string_lossy().into_owned())
        .map_err(|e| corrupt(archive_path, e))
}

fn corrupt(archive_path: &Path, err: std::io::Error) -> ArchiveError {
    ArchiveError::CorruptArchive(format!("{}: {}", archive_path.display(), err))
}
