//! Error types for the mapview streaming core

use thiserror::Error;

/// Main error type for the streaming core
#[derive(Debug, Error)]
pub enum Error {
    /// Corrupt or truncated raw-deflate stream
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// Declared element counts or string lengths exceed the buffer, or a
    /// decoded field violates the format
    #[error("Malformed data: {0}")]
    MalformedData(String),

    /// The byte source could not deliver the requested path
    #[error("Fetch failed for '{path}': {reason}")]
    Fetch { path: String, reason: String },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Texture error: {0}")]
    Texture(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a fetch failure on `path`
    pub fn fetch(path: impl Into<String>, reason: impl ToString) -> Self {
        Error::Fetch {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a malformed-data failure
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedData(msg.into())
    }
}
