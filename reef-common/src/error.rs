//! Common error types for Reef

use thiserror::Error;

/// Common result type for Reef operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the Reef crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Scene file is not valid TOML or doesn't match the schema
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
