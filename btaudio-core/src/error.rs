//! Error types shared across the btaudio components.

use thiserror::Error;

/// Top-level error type for the btaudio workspace.
///
/// Member crates define their own error enums and convert into this type
/// at the API boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid parameter provided by the caller.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Session or codec configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Codec-side error.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Resampling error.
    #[error("Resample error: {0}")]
    Resample(String),

    /// I/O errors (debug dumps, capture sinks).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the workspace error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid parameter error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
