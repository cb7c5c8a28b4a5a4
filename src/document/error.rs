use thiserror::Error;

use super::DocumentFormat;

/// Why a document could not be read or rebuilt.
///
/// Both variants are recoverable: callers degrade to a plain-text result and
/// surface the message to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// Support for the format was compiled out of this build.
    #[error("{format} support is not available in this build (enable the `{feature}` feature)", feature = .format.feature())]
    CapabilityUnavailable { format: DocumentFormat },

    /// The format's parser or serializer rejected the input.
    #[error("Error parsing {format}: {message}")]
    Malformed { format: DocumentFormat, message: String },
}

impl DocumentError {
    pub fn malformed(format: DocumentFormat, message: impl Into<String>) -> Self {
        DocumentError::Malformed {
            format,
            message: message.into(),
        }
    }

    pub fn format(&self) -> DocumentFormat {
        match self {
            DocumentError::CapabilityUnavailable { format } => *format,
            DocumentError::Malformed { format, .. } => *format,
        }
    }

    pub fn is_capability_unavailable(&self) -> bool {
        matches!(self, DocumentError::CapabilityUnavailable { .. })
    }
}
