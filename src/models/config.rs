use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::models::ArchiveError;

pub const DEFAULT_CHUNK_SIZE: usize = 4096;
pub const DEFAULT_EXTERNAL_ARCHIVER: &str = "zip";

/// Tunables for the archive layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchiverConfig {
    /// Block size used when streaming payloads (bytes, at least 1)
    pub chunk_size: usize,
    /// Program looked up on PATH for the external password tier
    pub external_archiver: String,
    /// Allow the built-in AES backend when it is compiled in
    pub native_encryption: bool,
    /// Deflate level for ZIP members (0-9)
    pub deflate_level: i64,
    /// Store already-compressed payloads (images, media, archives) in ZIP
    pub store_precompressed: bool,
}

impl ArchiverConfig {
    /// Override the streaming block size; zero becomes one byte
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Load a JSON config file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ArchiveError::SourceUnreadable(
                format!("{}: {}", path.display(), e)
            ))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ArchiveError::SourceUnreadable(
                format!("Invalid config {}: {}", path.display(), e)
            ))?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        self.chunk_size = self.chunk_size.max(1);
        self.deflate_level = self.deflate_level.clamp(0, 9);
        self
    }
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            external_archiver: DEFAULT_EXTERNAL_ARCHIVER.to_string(),
            native_encryption: true,
            deflate_level: 1,
            store_precompressed: true,
        }
    }
}
