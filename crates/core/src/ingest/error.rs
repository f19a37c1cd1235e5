//! Ingestion error types.

use std::num::ParseIntError;

use thiserror::Error;

use loimage_shared::AppError;

/// Upload ingestion errors. None of them leave partial state behind.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The part declares more bytes than allowed.
    #[error("the uploaded image {file_name} is too big: {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge {
        /// Filename of the part.
        file_name: String,
        /// Declared size.
        size: u64,
        /// Configured maximum.
        max: u64,
    },

    /// The part carries no filename.
    #[error("the uploaded part has no filename")]
    MissingFileName,

    /// The filename is not a base-10 integer.
    #[error("filename {file_name:?} is not a valid sort index")]
    InvalidSortIndex {
        /// Filename of the part.
        file_name: String,
        /// Parse failure.
        #[source]
        source: ParseIntError,
    },

    /// The classified type is not in the allow-list.
    #[error("the provided file format {file_type} is not allowed")]
    DisallowedFileType {
        /// Classified MIME type.
        file_type: String,
    },

    /// Reading the part failed or ended early.
    #[error("failed to read uploaded part: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Create a file too large error.
    #[must_use]
    pub fn file_too_large(file_name: impl Into<String>, size: u64, max: u64) -> Self {
        Self::FileTooLarge {
            file_name: file_name.into(),
            size,
            max,
        }
    }

    /// Create a disallowed file type error.
    #[must_use]
    pub fn disallowed_file_type(file_type: impl Into<String>) -> Self {
        Self::DisallowedFileType {
            file_type: file_type.into(),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::FileTooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            IngestError::DisallowedFileType { .. } => Self::UnsupportedMediaType(err.to_string()),
            IngestError::MissingFileName
            | IngestError::InvalidSortIndex { .. }
            | IngestError::Io(_) => Self::Validation(err.to_string()),
        }
    }
}
