//! Upload error types.

use carhome_shared::AppError;
use carhome_shared::types::id::FileId;
use thiserror::Error;
use validator::ValidationErrors;

use crate::storage::StorageError;

/// Upload Manager errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Malformed request.
    #[error("{0}")]
    Validation(String),

    /// Empty file.
    #[error("file '{0}' is empty")]
    EmptyFile(String),

    /// File larger than allowed for its type.
    #[error("file too large: {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge {
        /// Actual file size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// MIME type outside the allow-list.
    #[error("file type '{0}' is not allowed")]
    InvalidMimeType(String),

    /// Listing does not exist.
    #[error("listing not found: {0}")]
    ListingNotFound(String),

    /// File does not exist or is not visible to the caller.
    #[error("file not found: {0}")]
    NotFound(FileId),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl UploadError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a file too large error.
    #[must_use]
    pub fn file_too_large(size: u64, max: u64) -> Self {
        Self::FileTooLarge { size, max }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(id: FileId) -> Self {
        Self::NotFound(id)
    }

    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// True for failures caused by the request rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::EmptyFile(_)
                | Self::FileTooLarge { .. }
                | Self::InvalidMimeType(_)
                | Self::ListingNotFound(_)
                | Self::NotFound(_)
        )
    }
}

impl From<ValidationErrors> for UploadError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map_or_else(|| format!("{field} is invalid"), ToString::to_string)
                })
            })
            .collect();
        messages.sort();
        Self::Validation(messages.join("; "))
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(_)
            | UploadError::EmptyFile(_)
            | UploadError::FileTooLarge { .. }
            | UploadError::InvalidMimeType(_) => Self::Validation(err.to_string()),
            UploadError::ListingNotFound(_) => Self::NotFound(err.to_string()),
            UploadError::NotFound(_) => Self::NotFound("File not found".to_string()),
            UploadError::Storage(e) => Self::Storage(e.to_string()),
            UploadError::Repository(msg) => Self::Database(msg),
        }
    }
}
