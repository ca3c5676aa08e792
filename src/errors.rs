//! Error types for snapshot tracking operations.

use thiserror::Error;

/// Result type alias for specwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for specwatch operations
#[derive(Debug, Error)]
pub enum Error {
    /// Raw document could not be parsed into a tree
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Raw document exceeds size limits
    #[error("document exceeds size limit: {size} bytes (max {max_size})")]
    DocumentTooLarge { size: usize, max_size: usize },

    /// Snapshot not found
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(u64),

    /// Diff record not found
    #[error("diff not found: {0}")]
    DiffNotFound(u64),

    /// Storage key not found
    #[error("storage key not found: {0}")]
    KeyNotFound(String),

    /// Backend unavailable
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Lineage-scoped error
    #[error("lineage error service={service_name} source={source_url}: {source}")]
    Lineage {
        service_name: String,
        source_url: String,
        #[source]
        source: Box<Error>,
    },

    /// Validation error
    #[error("validation error: field={field} message={message}")]
    Validation { field: String, message: String },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Custom error for extensibility
    #[error("custom error: {0}")]
    Custom(String),
}

impl Error {
    /// Wraps an error with the lineage it occurred in
    pub fn lineage(service_name: String, source_url: String, source: Error) -> Self {
        Error::Lineage {
            service_name,
            source_url,
            source: Box::new(source),
        }
    }

    /// Creates a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a new invalid document error
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Error::InvalidDocument(message.into())
    }

    /// Creates a new document too large error
    pub fn document_too_large(size: usize, max_size: usize) -> Self {
        Error::DocumentTooLarge { size, max_size }
    }

    /// Creates a new backend unavailable error
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Error::BackendUnavailable(message.into())
    }

    /// Returns true if the error means "nothing stored under that key/id"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::KeyNotFound(_) | Error::SnapshotNotFound(_) | Error::DiffNotFound(_)
        )
    }
}
