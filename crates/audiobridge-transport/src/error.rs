//! Error types for the transport module.

use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Writing a request or reading its response failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer sent something that is not a valid message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid RTSP URL.
    #[error("Invalid RTSP URL: {0}")]
    InvalidUrl(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
