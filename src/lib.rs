// Module declarations
pub mod models;
pub mod core;
pub mod commands;
pub mod utils;

pub use crate::core::compression::ArchiveProcessor;
pub use crate::models::{
    ArchiveError, ArchiveErrorKind, ArchiveHandle, ArchiveMember, ArchiverConfig, CreationRequest,
    ExtractionRequest, FormatDescriptor, FormatId, FormatKind, FormatRegistry, MemberKind,
};
