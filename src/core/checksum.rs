use std::io::Read;
use std::path::Path;
use sha2::{Digest, Sha256};
use crate::core::file_ops::chunker::Chunker;
use crate::models::ArchiveError;

/// SHA-256 digest calculator for archive artifacts
///
/// The file is hashed chunk by chunk, so memory use does not depend on the
/// archive size.
pub struct ChecksumCalculator {
    chunker: Chunker,
}

impl ChecksumCalculator {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunker: Chunker::new(chunk_size),
        }
    }

    /// Lowercase hex SHA-256 of the file at `path`
    pub fn sha256_hex(&self, path: &Path) -> Result<String, ArchiveError> {
        let reader = self.chunker.open(path)?;
        self.sha256_hex_reader(reader)
    }

    /// Lowercase hex SHA-256 of everything `reader` yields
    pub fn sha256_hex_reader<R: Read>(&self, reader: R) -> Result<String, ArchiveError> {
        let mut hasher = Sha256::new();
        self.chunker.for_each_chunk_from(reader, |chunk| {
            hasher.update(chunk);
            Ok(())
        })?;

        Ok(hex::encode(hasher.finalize()))
    }
}

impl Default for ChecksumCalculator {
    fn default() -> Self {
        Self::new(crate::models::DEFAULT_CHUNK_SIZE)
    }
}
