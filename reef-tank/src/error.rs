//! Error types for reef-tank
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use std::sync::Arc;
use thiserror::Error;

/// Main error type for reef-tank
///
/// Cloneable so one load outcome can be handed to every caller waiting on it.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Asset failed its existence check (missing, unreachable, or refused)
    #[error("Asset unavailable: {0}")]
    AssetUnavailable(String),

    /// Asset existed but its body could not be fetched
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Invalid audio graph operation (stop before start, disconnect while unconnected)
    #[error("Audio graph error: {0}")]
    Graph(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Tile board registration errors
    #[error("Tile error: {0}")]
    Tile(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

/// Convenience Result type using reef-tank Error
pub type Result<T> = std::result::Result<T, Error>;
