//! Error types for the OSDU CLI
//!
//! User-facing errors with messages that say what to check next.

use osdu_common::OsduError;
use osdu_ingest::RemoteError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check config.json or the OSDU_* environment variables.")]
    Config(String),

    /// Required input file is missing
    #[error("File not found: '{0}'. Run the previous pipeline stage first or pass the path explicitly.")]
    FileNotFound(String),

    /// Invalid command-line value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Data platform request failed
    #[error("Request failed: {0}. Check the endpoint and access token.")]
    Remote(#[from] RemoteError),

    /// Some uploads or bulk items failed
    #[error("{failed} of {total} items failed. See {report} for details.")]
    ItemsFailed {
        failed: usize,
        total: usize,
        report: String,
    },

    #[error(transparent)]
    Osdu(OsduError),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}. Check the file syntax.")]
    JsonParse(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn file_not_found(path: &std::path::Path) -> Self {
        Self::FileNotFound(path.display().to_string())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<OsduError> for CliError {
    fn from(err: OsduError) -> Self {
        match err {
            OsduError::Config(msg) => Self::Config(msg),
            other => Self::Osdu(other),
        }
    }
}
