//! Common error types for EmotioX response tooling

use thiserror::Error;

/// Common result type for EmotioX operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the response tooling
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Response payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write rejected because it collides with an existing record
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A question key component was empty or contained the reserved separator
    #[error("Invalid key component {component} = {value:?}: {reason}")]
    InvalidKeyComponent {
        component: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The store rejected a document rewrite during a maintenance pass
    #[error("Failed to write document {document_id}: {reason}")]
    DocumentWriteFailure { document_id: String, reason: String },
}
