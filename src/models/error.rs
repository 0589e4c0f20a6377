use serde::Serialize;
use thiserror::Error;

/// Error type shared by every archive operation
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Unknown archive format: {0}")]
    UnknownFormat(String),

    #[error("Format {format} accepts a single input, got {count}")]
    InputCountViolation { format: String, count: usize },

    #[error("No input files to archive")]
    EmptyInput,

    #[error("Destination not writable: {0}")]
    DestinationUnwritable(String),

    #[error("Source not readable: {0}")]
    SourceUnreadable(String),

    #[error("No password-capable backend succeeded: {0}")]
    StrategyExhausted(String),

    #[error("Password protection not supported: {0}")]
    PasswordUnsupported(String),

    #[error("Password required: {0}")]
    PasswordRequired(String),

    #[error("Corrupted archive: {0}")]
    CorruptArchive(String),

    #[error("Archive not found: {0}")]
    NotFound(String),

    #[error("Member not found in archive: {0}")]
    MemberNotFound(String),

    #[error("Operation not supported: {0}")]
    OperationUnsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Discriminant of [`ArchiveError`], serializable for frontends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ArchiveErrorKind {
    UnknownFormat,
    InputCountViolation,
    EmptyInput,
    DestinationUnwritable,
    SourceUnreadable,
    StrategyExhausted,
    PasswordUnsupported,
    PasswordRequired,
    CorruptArchive,
    NotFound,
    MemberNotFound,
    OperationUnsupported,
    Io,
}

impl ArchiveError {
    pub fn kind(&self) -> ArchiveErrorKind {
        match self {
            Self::UnknownFormat(_) => ArchiveErrorKind::UnknownFormat,
            Self::InputCountViolation { .. } => ArchiveErrorKind::InputCountViolation,
            Self::EmptyInput => ArchiveErrorKind::EmptyInput,
            Self::DestinationUnwritable(_) => ArchiveErrorKind::DestinationUnwritable,
            Self::SourceUnreadable(_) => ArchiveErrorKind::SourceUnreadable,
            Self::StrategyExhausted(_) => ArchiveErrorKind::StrategyExhausted,
            Self::PasswordUnsupported(_) => ArchiveErrorKind::PasswordUnsupported,
            Self::PasswordRequired(_) => ArchiveErrorKind::PasswordRequired,
            Self::CorruptArchive(_) => ArchiveErrorKind::CorruptArchive,
            Self::NotFound(_) => ArchiveErrorKind::NotFound,
            Self::MemberNotFound(_) => ArchiveErrorKind::MemberNotFound,
            Self::OperationUnsupported(_) => ArchiveErrorKind::OperationUnsupported,
            Self::Io(_) => ArchiveErrorKind::Io,
        }
    }
}

// Frontend commands return Result<T, String>
impl From<ArchiveError> for String {
    fn from(err: ArchiveError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(ArchiveError::EmptyInput.kind(), ArchiveErrorKind::EmptyInput);
        assert_eq!(
            ArchiveError::PasswordRequired("a.zip".into()).kind(),
            ArchiveErrorKind::PasswordRequired
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(ArchiveError::from(io).kind(), ArchiveErrorKind::Io);
    }

    #[test]
    fn test_into_string() {
        let msg: String = ArchiveError::InputCountViolation {
            format: "gzip".into(),
            count: 3,
        }
        .into();
        assert_eq!(msg, "Format gzip accepts a single input, got 3");
    }

    #[test]
    fn test_kind_serializes_camel_case() {
        let json = serde_json::to_string(&ArchiveErrorKind::MemberNotFound).unwrap();
        assert_eq!(json, "\"memberNotFound\"");
    }
}
