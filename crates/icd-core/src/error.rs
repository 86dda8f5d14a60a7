//! Error types for the ICD search library.
//!
//! Every failure on the search path collapses into [`CatalogError`]. The HTTP
//! layer decides what, if anything, reaches the client.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for catalog and search operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    // Store errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Search task failed: {message}")]
    Task { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },
}

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<tokio::task::JoinError> for CatalogError {
    fn from(err: tokio::task::JoinError) -> Self {
        CatalogError::Task {
            message: err.to_string(),
        }
    }
}

impl CatalogError {
    /// Create a database error that has no underlying driver error.
    pub fn database(message: impl Into<String>) -> Self {
        CatalogError::Database {
            message: message.into(),
            source: None,
        }
    }

    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CatalogError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Check if the error means the connection that produced it is unusable.
    ///
    /// Pooled connections that fail this way are discarded instead of being
    /// returned to the idle list.
    pub fn is_connection_fault(&self) -> bool {
        match self {
            CatalogError::Database {
                source: Some(rusqlite::Error::SqliteFailure(err, _)),
                ..
            } => matches!(
                err.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::SystemIoFailure
                    | rusqlite::ErrorCode::DatabaseCorrupt
                    | rusqlite::ErrorCode::NotADatabase
            ),
            _ => false,
        }
    }
}
