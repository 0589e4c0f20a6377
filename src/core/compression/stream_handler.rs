use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use lzma_rust2::{XzOptions, XzReader, XzWriter};
use crate::core::compression::common::{ArchiveHandler, MemberFilter, ensure_parent};
use crate::core::file_ops::chunker::Chunker;
use crate::models::{
    ArchiveError, ArchiveMember, ArchiverConfig, FormatDescriptor, FormatId, SourceEntry,
};

const XZ_PRESET: u32 = 6;

/// Handler for single-stream compression formats (gzip, bzip2, xz)
///
/// These formats wrap exactly one payload and carry no member table. The
/// payload's name is derived from the artifact: `notes.txt.gz` holds
/// `notes.txt`.
pub struct StreamHandler {
    chunker: Chunker,
    level: u32,
}

impl StreamHandler {
    pub fn new() -> Self {
        Self::with_config(&ArchiverConfig::default())
    }

    pub fn with_config(config: &ArchiverConfig) -> Self {
        Self {
            chunker: Chunker::new(config.chunk_size),
            level: config.deflate_level.clamp(1, 9) as u32,
        }
    }

    fn decoder(&self, format: FormatId, archive_path: &Path) -> Result<Box<dyn Read>, ArchiveError> {
        let file = File::open(archive_path)
            .map_err(|e| ArchiveError::NotFound(
                format!("Failed to open {}: {}", archive_path.display(), e)
            ))?;
        let input = BufReader::with_capacity(self.chunker.chunk_size(), file);

        let reader: Box<dyn Read> = match format {
            // Concatenated streams decode as one payload
            FormatId::Gzip => Box::new(MultiGzDecoder::new(input)),
            FormatId::Bzip2 => Box::new(MultiBzDecoder::new(input)),
            FormatId::Xz => Box::new(XzReader::new(input, true)),
            other => {
                return Err(ArchiveError::OperationUnsupported(
                    format!("{:?} is not a single-stream format", other)
                ))
            }
        };
        Ok(reader)
    }

    /// Compress `source` into `output` and flush the codec trailer
    fn encode(&self, format: FormatId, source: &SourceEntry, output: File) -> Result<(), ArchiveError> {
        let write_error = |e: io::Error| ArchiveError::DestinationUnwritable(
            format!("Failed to write compressed stream: {}", e)
        );

        match format {
            FormatId::Gzip => {
                let mut encoder = GzEncoder::new(output, flate2::Compression::new(self.level));
                self.feed(source, &mut encoder)?;
                encoder.finish().map_err(write_error)?;
            }
            FormatId::Bzip2 => {
                let mut encoder = BzEncoder::new(output, bzip2::Compression::new(self.level));
                self.feed(source, &mut encoder)?;
                encoder.finish().map_err(write_error)?;
            }
            FormatId::Xz => {
                let mut encoder = XzWriter::new(output, XzOptions::with_preset(XZ_PRESET))
                    .map_err(write_error)?;
                self.feed(source, &mut encoder)?;
                encoder.finish().map_err(write_error)?;
            }
            other => {
                return Err(ArchiveError::OperationUnsupported(
                    format!("{:?} is not a single-stream format", other)
                ))
            }
        }
        Ok(())
    }

    fn feed<W: Write>(&self, source: &SourceEntry, encoder: &mut W) -> Result<(), ArchiveError> {
        let total = self.chunker.for_each_chunk(&source.path, |chunk| {
            encoder.write_all(chunk).map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to compress {}: {}", source.name, e)
            ))
        })?;
        log::debug!("compressed {} ({} bytes)", source.name, total);
        Ok(())
    }
}

impl ArchiveHandler for StreamHandler {
    fn supports(&self, format: FormatId) -> bool {
        matches!(format, FormatId::Gzip | FormatId::Bzip2 | FormatId::Xz)
    }

    fn create(
        &self,
        format: &FormatDescriptor,
        entries: &[SourceEntry],
        output: &Path,
    ) -> Result<(), ArchiveError> {
        let source = match entries {
            [single] => single,
            _ => {
                return Err(ArchiveError::InputCountViolation {
                    format: format.id.to_string(),
                    count: entries.len(),
                })
            }
        };

        let file = File::create(output)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to create {}: {}", output.display(), e)
            ))?;

        self.encode(format.format, source, file)
    }

    /// Reports the single payload; its size is found by decompressing
    fn list(&self, format: &FormatDescriptor, archive_path: &Path) -> Result<Vec<ArchiveMember>, ArchiveError> {
        let name = payload_name(format, archive_path);
        let reader = self.decoder(format.format, archive_path)?;
        let size = self.chunker.copy_payload(&name, reader, &mut io::sink())?;

        Ok(vec![ArchiveMember::file(name, size)])
    }

    fn extract(
        &self,
        format: &FormatDescriptor,
        archive_path: &Path,
        dest_dir: &Path,
        keep: MemberFilter<'_>,
    ) -> Result<Vec<String>, ArchiveError> {
        let name = payload_name(format, archive_path);
        if !keep(&name) {
            return Ok(Vec::new());
        }

        let reader = self.decoder(format.format, archive_path)?;
        let output_path = dest_dir.join(&name);
        ensure_parent(&output_path)?;

        let mut out = File::create(&output_path)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to create output file {}: {}", output_path.display(), e)
            ))?;
        self.chunker.copy_payload(&name, reader, &mut out)?;

        Ok(vec![name])
    }
}

impl Default for StreamHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Name of the payload inside a single-stream artifact
///
/// Strips the format extension (`data.csv.gz` -> `data.csv`). Artifacts
/// without it lose their last extension, or gain `.out` if they have none.
pub fn payload_name(format: &FormatDescriptor, archive_path: &Path) -> String {
    let file_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some(stem) = file_name.strip_suffix(format.file_extension) {
        if !stem.is_empty() {
            return stem.to_string();
        }
    }

    match archive_path.file_stem().map(|s| s.to_string_lossy().into_owned()) {
        Some(stem) if stem != file_name && !stem.is_empty() => stem,
        _ => format!("{}.out", file_name),
    }
}
