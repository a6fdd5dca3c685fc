//! Error types for the codec module.

use thiserror::Error;

/// Errors that can occur while selecting or running a decoder.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The session negotiated a codec we cannot decode.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// A session attribute the codec needs is absent.
    #[error("Missing session parameter: {0}")]
    MissingParameter(&'static str),

    /// A session attribute could not be parsed.
    #[error("Invalid session parameter: {0}")]
    InvalidParameter(String),

    /// Decoder initialization failed.
    #[error("Decoder initialization failed: {0}")]
    Initialization(String),

    /// A frame could not be decoded.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// A frame had an impossible size or layout.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}
