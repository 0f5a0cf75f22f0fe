//! Error types for the display server.

use thiserror::Error;

/// Errors that can occur while rendering, encoding or configuring the server.
#[derive(Debug, Error)]
pub enum Error {
    /// The embedded font could not be parsed
    #[error("Failed to load font: {0}")]
    Font(String),

    /// A character has no glyph in the loaded font
    #[error("No glyph for {ch:?} in font")]
    MissingGlyph {
        /// The offending character
        ch: char,
    },

    /// Raster image encoding failed
    #[error("Image encoding failed: {0}")]
    Encode(String),

    /// Invalid configuration (schedule file, CLI value, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// File or socket I/O failed
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<png::EncodingError> for Error {
    fn from(err: png::EncodingError) -> Self {
        Error::Encode(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
