//! Error types for streaming operations

use std::io;
use thiserror::Error;

/// Result type for streaming operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors that can occur while accepting, launching or streaming a run
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Error starting command: {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Response sink closed")]
    SinkClosed,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Tool catalogue error: {0}")]
    Catalog(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StreamError {
    /// Whether the error belongs to the caller (reported as HTTP 400)
    pub fn is_client_error(&self) -> bool {
        matches!(self, StreamError::Validation(_) | StreamError::Json(_))
    }
}
