//! Error types for the audio module.

use thiserror::Error;

/// Errors that can occur during audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// A PCM byte buffer did not hold a whole number of 16-bit samples.
    #[error("PCM buffer has an odd byte count: {0}")]
    OddByteCount(usize),

    /// A capture or playback device could not be created.
    #[error("Audio device initialization failed: {0}")]
    DeviceInit(String),

    /// A sink rejected a buffer.
    #[error("Failed to write audio to sink: {0}")]
    SinkWrite(String),

    /// Handler was used before being started.
    #[error("Audio handler not started")]
    NotStarted,

    /// IO error from a sink backed by a socket or file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
