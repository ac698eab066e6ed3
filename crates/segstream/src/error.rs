//! Error types for the segmentation engine.
//!
//! Malformed model output is never an error; these variants only cover
//! misuse by the caller and unusable configuration.

use thiserror::Error;

/// Result type alias using the segmentation error type.
pub type Result<T> = std::result::Result<T, SegmentError>;

/// Error type for segmentation operations.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// `feed` or `finalize` called after the stream was finalized.
    #[error("stream already finalized; call reset() before reusing the parser")]
    AlreadyFinalized,

    /// Configuration the parser cannot be built from.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown segment kind name.
    #[error("Unknown segment kind: {0}")]
    UnknownKind(String),
}

impl SegmentError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<segstream_config::ConfigError> for SegmentError {
    fn from(err: segstream_config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
