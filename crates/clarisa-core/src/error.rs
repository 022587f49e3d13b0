//! Error types for the Clarisa replication engine.
//!
//! Only remote failures are meant to escape a replication cycle. Store
//! failures are contained by the orchestrator and surface as log records.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the replication engine.
#[derive(Debug, Error)]
pub enum ClarisaError {
    // Remote errors
    #[error("Clarisa request failed: {message}")]
    RemoteUnavailable {
        message: String,
        /// HTTP status returned by Clarisa, when a response was received.
        status: Option<u16>,
    },

    #[error("Clarisa response did not match the expected schema: {message}")]
    SchemaMismatch { message: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

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
}

/// Result type alias for replication operations.
pub type Result<T> = std::result::Result<T, ClarisaError>;

/// Clarisa bodies are the only JSON the engine decodes.
impl From<serde_json::Error> for ClarisaError {
    fn from(err: serde_json::Error) -> Self {
        ClarisaError::SchemaMismatch {
            message: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for ClarisaError {
    fn from(err: rusqlite::Error) -> Self {
        ClarisaError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for ClarisaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClarisaError::SchemaMismatch {
                message: err.to_string(),
            }
        } else {
            ClarisaError::RemoteUnavailable {
                message: err.to_string(),
                status: err.status().map(|s| s.as_u16()),
            }
        }
    }
}

impl ClarisaError {
    /// Create a database error that has no underlying rusqlite cause.
    pub fn database(message: impl Into<String>) -> Self {
        ClarisaError::Database {
            message: message.into(),
            source: None,
        }
    }

    /// True for failures of the remote source, which abort a cycle.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ClarisaError::RemoteUnavailable { .. } | ClarisaError::SchemaMismatch { .. }
        )
    }

    /// HTTP status used when the error is reported by the trigger endpoint.
    ///
    /// Remote failures are reported as bad requests, everything else as an
    /// internal server error.
    pub fn to_http_status(&self) -> u16 {
        match self {
            ClarisaError::RemoteUnavailable { .. } | ClarisaError::SchemaMismatch { .. } => 400,
            ClarisaError::Config { .. } => 400,
            _ => 500,
        }
    }
}
