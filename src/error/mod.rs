//! Error types for the tile compression library.

use thiserror::Error;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, TileCompError>;

/// Main error type for the tile compression library.
///
/// A codec-table miss is not an error: [`crate::codec::CodecRegistry::resolve`]
/// reports it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum TileCompError {
    /// The codec ran but found the input unsuitable (e.g. a pixel value
    /// outside the representable range). Surfaced to callers of a
    /// [`crate::codec::CodecControl`] as `false`, never as an error.
    #[error("Compression declined: {0}")]
    Declined(String),

    /// Decompression of committed tile data failed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A registered codec binding could not be turned into a working control.
    #[error("Codec construction failed for {key}: {reason}")]
    Construction {
        /// Algorithm triple the binding was resolved for.
        key: String,
        /// What went wrong.
        reason: String,
    },

    /// The option handed to a codec does not belong to it or is out of range.
    #[error("Invalid codec option: {0}")]
    InvalidOption(String),

    /// A tile buffer of the wrong element type was passed.
    #[error("Element type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Element type the codec is bound to.
        expected: crate::tile::ElementType,
        /// Element type of the buffer that was supplied.
        actual: crate::tile::ElementType,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<toml::de::Error> for TileCompError {
    fn from(err: toml::de::Error) -> Self {
        TileCompError::Config(err.to_string())
    }
}
