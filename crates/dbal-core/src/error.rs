//! Error types for DBAL

use thiserror::Error;

/// Core error type for DBAL operations
#[derive(Error, Debug)]
pub enum DbalError {
    /// Failure to open or authenticate, or use of a closed connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single statement was rejected by the server
    #[error("Execution error: {0}")]
    Execution(String),

    /// Malformed input: fixture markers, config keys, DSN, aliases
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("{0}")]
    Other(String),
}

impl DbalError {
    /// Whether this error means the database could not be reached at all
    pub fn is_connection(&self) -> bool {
        matches!(self, DbalError::Connection(_))
    }
}

/// Result type alias for DBAL operations
pub type Result<T> = std::result::Result<T, DbalError>;
