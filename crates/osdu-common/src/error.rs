//! Error types for OSDU ingest

use thiserror::Error;

/// Result type alias for OSDU ingest operations
pub type Result<T> = std::result::Result<T, OsduError>;

/// Main error type shared across the workspace
#[derive(Error, Debug)]
pub enum OsduError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Object store error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl OsduError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an object store error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Returns true for errors caused by local files or settings.
    ///
    /// These abort a run before any task is dispatched.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            OsduError::Io(_) | OsduError::Serialization(_) | OsduError::Config(_) | OsduError::Parse(_)
        )
    }
}
