//! Storage error types.

use std::fmt;

/// Errors that can occur during document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The addressed document does not exist.
    #[error("Document not found: {path}")]
    NotFound {
        /// `collection/id` of the missing document.
        path: String,
    },

    /// The document exists but lacks the field an increment targets.
    #[error("Field {field} missing on {path}")]
    FieldMissing { path: String, field: String },

    /// A create targeted a document that already exists.
    #[error("Document already exists: {path}")]
    AlreadyExists { path: String },

    /// A write batch carried more operations than the store accepts.
    #[error("Write batch of {size} operations exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    /// The document or write is malformed (e.g. incrementing a string field).
    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },

    /// The store could not be reached or refused temporarily. Retryable.
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(path: impl fmt::Display) -> Self {
        Self::NotFound {
            path: path.to_string(),
        }
    }

    #[must_use]
    pub fn field_missing(path: impl fmt::Display, field: impl Into<String>) -> Self {
        Self::FieldMissing {
            path: path.to_string(),
            field: field.into(),
        }
    }

    #[must_use]
    pub fn already_exists(path: impl fmt::Display) -> Self {
        Self::AlreadyExists {
            path: path.to_string(),
        }
    }

    #[must_use]
    pub fn batch_too_large(size: usize, limit: usize) -> Self {
        Self::BatchTooLarge { size, limit }
    }

    #[must_use]
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// `true` when an increment failed only because its target document or
    /// field does not exist yet. Every other failure is a real error.
    #[must_use]
    pub fn is_missing_target(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::FieldMissing { .. })
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } | Self::FieldMissing { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::BatchTooLarge { .. } | Self::InvalidDocument { .. } => ErrorCategory::Validation,
            Self::Unavailable { .. } => ErrorCategory::Transient,
            Self::PermissionDenied { .. } => ErrorCategory::Permission,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<kindred_core::CoreError> for StorageError {
    fn from(err: kindred_core::CoreError) -> Self {
        Self::invalid_document(err.to_string())
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Transient,
    Permission,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Transient => write!(f, "transient"),
            Self::Permission => write!(f, "permission"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("users/B");
        assert_eq!(err.to_string(), "Document not found: users/B");

        let err = StorageError::field_missing("users/B", "totalInterestsCount");
        assert_eq!(err.to_string(), "Field totalInterestsCount missing on users/B");

        let err = StorageError::batch_too_large(501, 500);
        assert_eq!(
            err.to_string(),
            "Write batch of 501 operations exceeds the limit of 500"
        );
    }

    #[test]
    fn test_missing_target_is_only_not_found_or_field_missing() {
        assert!(StorageError::not_found("users/B").is_missing_target());
        assert!(StorageError::field_missing("users/B", "x").is_missing_target());
        assert!(!StorageError::unavailable("timeout").is_missing_target());
        assert!(!StorageError::permission_denied("rules").is_missing_target());
        assert!(!StorageError::invalid_document("not a number").is_missing_target());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::already_exists("processed_events/k").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::unavailable("down").category().to_string(),
            "transient"
        );
        assert!(StorageError::unavailable("down").is_transient());
    }
}
