use std::collections::HashSet;
use std::path::Path;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions, CompressionMethod};
use zip::result::ZipError;
use crate::core::compression::common::{ArchiveHandler, MemberFilter, ensure_parent};
use crate::core::file_ops::chunker::Chunker;
use crate::models::{
    ArchiveError, ArchiveMember, ArchiverConfig, FormatDescriptor, FormatId, SourceEntry,
};

/// ZIP archive handler
///
/// Creates, lists, extracts and appends to ZIP archives. Password-protected
/// creation goes through [`ZipHandler::write_archive`], which the native
/// encryption backend calls with a password.
pub struct ZipHandler {
    chunker: Chunker,
    deflate_level: i64,
    store_precompressed: bool,
}

impl ZipHandler {
    pub fn new() -> Self {
        Self::with_config(&ArchiverConfig::default())
    }

    pub fn with_config(config: &ArchiverConfig) -> Self {
        Self {
            chunker: Chunker::new(config.chunk_size),
            deflate_level: config.deflate_level,
            store_precompressed: config.store_precompressed,
        }
    }

    /// Write `entries` into a new ZIP at `output`, AES-256 encrypted when a
    /// password is given
    pub fn write_archive(
        &self,
        entries: &[SourceEntry],
        output: &Path,
        password: Option<&str>,
    ) -> Result<(), ArchiveError> {
        let file = File::create(output)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to create ZIP file {}: {}", output.display(), e)
            ))?;
        let mut zip = ZipWriter::new(file);

        for entry in entries {
            let options = self.member_options(&entry.name);

            #[cfg(feature = "aes")]
            let options = match password {
                Some(password) => options.with_aes_encryption(zip::AesMode::Aes256, password),
                None => options,
            };

            #[cfg(not(feature = "aes"))]
            let options = {
                if password.is_some() {
                    return Err(ArchiveError::PasswordUnsupported(
                        "built without the `aes` feature".to_string()
                    ));
                }
                options
            };

            zip.start_file(entry.name.as_str(), options)
                .map_err(|e| write_error(&entry.name, e))?;
            self.write_payload(&mut zip, entry)?;
        }

        zip.finish()
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to finalize ZIP archive: {}", e)
            ))?;

        Ok(())
    }

    fn write_payload(&self, zip: &mut ZipWriter<File>, entry: &SourceEntry) -> Result<(), ArchiveError> {
        self.chunker.for_each_chunk(&entry.path, |chunk| {
            zip.write_all(chunk)
                .map_err(|e| ArchiveError::DestinationUnwritable(
                    format!("Failed to write {} to archive: {}", entry.name, e)
                ))
        })?;
        Ok(())
    }

    /// Already-compressed payloads are stored, the rest deflated
    fn member_options(&self, name: &str) -> SimpleFileOptions {
        let base = SimpleFileOptions::default().unix_permissions(0o644);
        if self.store_precompressed && is_already_compressed(name) {
            base.compression_method(CompressionMethod::Stored)
        } else {
            base.compression_method(CompressionMethod::Deflated)
                .compression_level(Some(self.deflate_level))
        }
    }

    fn open(&self, archive_path: &Path) -> Result<ZipArchive<File>, ArchiveError> {
        let file = File::open(archive_path)
            .map_err(|e| ArchiveError::NotFound(
                format!("Failed to open ZIP archive {}: {}", archive_path.display(), e)
            ))?;

        ZipArchive::new(file).map_err(|e| read_error(archive_path, e))
    }
}

impl ArchiveHandler for ZipHandler {
    fn supports(&self, format: FormatId) -> bool {
        format == FormatId::Zip
    }

    fn create(
        &self,
        _format: &FormatDescriptor,
        entries: &[SourceEntry],
        output: &Path,
    ) -> Result<(), ArchiveError> {
        self.write_archive(entries, output, None)
    }

    /// Reads the central directory only; encrypted members are listed
    /// without needing their password
    fn list(&self, _format: &FormatDescriptor, archive_path: &Path) -> Result<Vec<ArchiveMember>, ArchiveError> {
        let mut archive = self.open(archive_path)?;
        let mut members = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)
                .map_err(|e| read_error(archive_path, e))?;

            let member = if file.is_dir() {
                ArchiveMember::directory(file.name())
            } else {
                ArchiveMember::file(file.name(), file.size())
            };
            members.push(member);
        }

        Ok(members)
    }

    /// # Behavior
    /// - Preserves directory hierarchy, creating parents as needed
    /// - Fails with `PasswordRequired` before writing anything if a selected
    ///   member is encrypted
    /// - Skips members whose names would escape `dest_dir`
    /// - Sets file permissions on Unix systems
    fn extract(
        &self,
        _format: &FormatDescriptor,
        archive_path: &Path,
        dest_dir: &Path,
        keep: MemberFilter<'_>,
    ) -> Result<Vec<String>, ArchiveError> {
        let mut archive = self.open(archive_path)?;

        let mut selected = Vec::new();
        for i in 0..archive.len() {
            let name = archive.by_index_raw(i)
                .map_err(|e| read_error(archive_path, e))?
                .name()
                .to_string();
            if keep(&name) {
                selected.push((i, name));
            }
        }

        // Opening a member for decoding is where encryption shows up
        for (i, _) in &selected {
            archive.by_index(*i)
                .map(drop)
                .map_err(|e| read_error(archive_path, e))?;
        }

        let mut extracted = Vec::with_capacity(selected.len());
        for (i, name) in selected {
            let mut file = archive.by_index(i)
                .map_err(|e| read_error(archive_path, e))?;

            let output_path = match file.enclosed_name() {
                Some(path) => dest_dir.join(path),
                None => {
                    log::warn!("skipping ZIP member with unsafe name {:?}", name);
                    continue;
                }
            };

            if file.is_dir() {
                fs::create_dir_all(&output_path)
                    .map_err(|e| ArchiveError::DestinationUnwritable(
                        format!("Failed to create directory {}: {}", output_path.display(), e)
                    ))?;
            } else {
                ensure_parent(&output_path)?;

                let mut output_file = File::create(&output_path)
                    .map_err(|e| ArchiveError::DestinationUnwritable(
                        format!("Failed to create output file {}: {}", output_path.display(), e)
                    ))?;

                self.chunker.copy_payload(&name, &mut file, &mut output_file)?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    if let Some(mode) = file.unix_mode() {
                        fs::set_permissions(&output_path, fs::Permissions::from_mode(mode & 0o777))
                            .map_err(|e| ArchiveError::DestinationUnwritable(
                                format!("Failed to set permissions: {}", e)
                            ))?;
                    }
                }
            }

            extracted.push(name);
        }

        Ok(extracted)
    }

    /// Appends new members and rewrites only the central directory.
    /// A base name already present in the archive is rejected.
    fn append(
        &self,
        _format: &FormatDescriptor,
        archive_path: &Path,
        entries: &[SourceEntry],
    ) -> Result<(), ArchiveError> {
        let mut names: HashSet<String> = self.open(archive_path)?
            .file_names()
            .map(str::to_string)
            .collect();
        for entry in entries {
            if !names.insert(entry.name.clone()) {
                return Err(ArchiveError::OperationUnsupported(
                    format!("{} already exists in {}", entry.name, archive_path.display())
                ));
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(archive_path)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to open {} for writing: {}", archive_path.display(), e)
            ))?;

        let mut zip = ZipWriter::new_append(file)
            .map_err(|e| read_error(archive_path, e))?;

        for entry in entries {
            zip.start_file(entry.name.as_str(), self.member_options(&entry.name))
                .map_err(|e| write_error(&entry.name, e))?;
            self.write_payload(&mut zip, entry)?;
        }

        zip.finish()
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to finalize ZIP archive: {}", e)
            ))?;

        Ok(())
    }
}

impl Default for ZipHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a read-side ZIP failure, keeping encryption distinct from damage
fn read_error(archive_path: &Path, err: ZipError) -> ArchiveError {
    match err {
        ZipError::UnsupportedArchive(msg) if msg == ZipError::PASSWORD_REQUIRED => {
            ArchiveError::PasswordRequired(format!("{} contains encrypted members", archive_path.display()))
        }
        ZipError::InvalidPassword => {
            ArchiveError::PasswordRequired(format!("{} contains encrypted members", archive_path.display()))
        }
        other => ArchiveError::CorruptArchive(format!("{}: {}", archive_path.display(), other)),
    }
}

fn write_error(name: &str, err: ZipError) -> ArchiveError {
    ArchiveError::DestinationUnwritable(format!("Failed to start {} in archive: {}", name, err))
}

/// Returns true for formats that are already compressed and won't benefit from Deflate.
fn is_already_compressed(name: &str) -> bool {
    let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    matches!(
        ext.as_str(),
        "png" | "jpg" | "jpeg" | "gif" | "webp"
            | "mp3" | "mp4" | "ogg" | "wav" | "aac" | "flac"
            | "zip" | "7z" | "rar" | "gz" | "bz2" | "xz" | "tgz"
    )
}
