//! Storage error types.

use thiserror::Error;

/// Failures talking to the blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object under `key`.
    #[error("object not found: {key}")]
    NotFound {
        /// Missing key.
        key: String,
    },

    /// Provider settings are incomplete or rejected by OpenDAL.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// The backend failed a read, write or delete.
    #[error("storage backend failed on {key}: {message}")]
    Backend {
        /// Key being operated on.
        key: String,
        /// Backend error text.
        message: String,
    },
}

impl StorageError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a backend failure for `key`.
    #[must_use]
    pub fn backend(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            key: key.into(),
            message: message.into(),
        }
    }

    /// True when the object was already absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn from_opendal(key: &str, err: &opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::not_found(key),
            _ => Self::backend(key, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opendal_not_found_keeps_key() {
        let err = opendal::Error::new(opendal::ErrorKind::NotFound, "gone");
        let mapped = StorageError::from_opendal("uploads/a.png", &err);
        assert!(mapped.is_not_found());
        assert_eq!(mapped.to_string(), "object not found: uploads/a.png");
    }

    #[test]
    fn test_other_opendal_errors_are_backend_failures() {
        let err = opendal::Error::new(opendal::ErrorKind::PermissionDenied, "denied");
        let mapped = StorageError::from_opendal("uploads/a.png", &err);
        assert!(matches!(mapped, StorageError::Backend { ref key, .. } if key == "uploads/a.png"));
    }
}
