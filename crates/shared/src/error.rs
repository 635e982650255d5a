//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
///
/// Every failure surfaced over HTTP ends up as one of these variants; the
/// api crate renders them as `{"error": <code>, "message": <text>}`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Identity verification failed.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request body larger than the configured limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Storage backend write/delete failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// No storage backend is configured.
    #[error("Storage not configured")]
    StorageNotConfigured,

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::PayloadTooLarge(_) => 413,
            Self::StorageNotConfigured => 503,
            Self::Storage(_) | Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::StorageNotConfigured => "STORAGE_NOT_CONFIGURED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true for failures caused by the server rather than the request.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Message safe to show to clients.
    ///
    /// Server-side failures are replaced by a generic text; the detailed
    /// message is only logged.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(msg)
            | Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::PayloadTooLarge(msg) => msg.clone(),
            Self::Storage(_) => "Storage operation failed".to_string(),
            Self::StorageNotConfigured => "File storage is not configured".to_string(),
            Self::Database(_) | Self::Internal(_) => "An error occurred".to_string(),
        }
    }
}
