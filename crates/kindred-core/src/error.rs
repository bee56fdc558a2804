use thiserror::Error;

/// Core error types for document decoding and path handling
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },

    #[error("Unknown counter: {0}")]
    UnknownCounter(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidTimestamp error
    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        Self::InvalidTimestamp(value.into())
    }

    /// Create a new InvalidPath error
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a new MissingField error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a new InvalidField error
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new InvalidDocument error
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Errors caused by the shape of caller-supplied data rather than by the system.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTimestamp(_)
                | Self::InvalidPath(_)
                | Self::MissingField { .. }
                | Self::InvalidField { .. }
                | Self::InvalidDocument { .. }
                | Self::UnknownCounter(_)
                | Self::JsonError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
