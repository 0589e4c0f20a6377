pub mod error;
pub mod format;
pub mod archive;
pub mod config;

// Re-export commonly used types
pub use error::{ArchiveError, ArchiveErrorKind};
pub use format::{FormatDescriptor, FormatId, FormatKind, FormatRegistry};
pub use archive::{
    is_excluded, ArchiveHandle, ArchiveMember, CreationRequest, ExtractionRequest, MemberKind,
    SourceEntry,
};
pub use config::{ArchiverConfig, DEFAULT_CHUNK_SIZE};
