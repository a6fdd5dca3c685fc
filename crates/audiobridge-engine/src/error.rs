//! Error types for the bridge and the player.

use thiserror::Error;

use audiobridge_audio::AudioError;
use audiobridge_codec::CodecError;

use crate::client::ClientId;

/// Errors returned by bridge setup calls.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// An input source has already been chosen for this bridge.
    #[error("An input source has already been defined for this bridge ({0})")]
    AlreadyConfigured(&'static str),

    /// A capture or playback device could not be created.
    #[error("Initialization failed: {0}")]
    Initialization(#[source] AudioError),

    /// An output could not be connected to the active input.
    #[error("Wiring failed: {0}")]
    Wiring(String),

    #[error(transparent)]
    Player(#[from] PlayerError),
}

/// Errors returned by the streaming-receiver player.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The session negotiated a codec we cannot decode.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// A decoder could not be created for the session.
    #[error("Decoder setup failed: {0}")]
    Decoder(#[source] CodecError),

    /// The client registry is full.
    #[error("Client capacity of {capacity} exceeded")]
    ClientCapacityExceeded { capacity: usize },

    /// This client instance is already attached under the given id.
    #[error("Client already attached as {0}")]
    ClientAlreadyAttached(ClientId),

    /// No attached client has this id.
    #[error("Unknown client: {0}")]
    UnknownClient(ClientId),

    /// The stored artwork is not a decodable image.
    #[error("Artwork decode failed: {0}")]
    ArtworkDecode(String),

    /// A gradient needs at least one stop.
    #[error("Invalid gradient resolution: {0}")]
    InvalidResolution(usize),

    /// One frame could not be decoded or written.
    #[error("Frame error: {0}")]
    Frame(String),

    /// The session thread could not be started.
    #[error("Failed to spawn session thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// A client failed to accept a control parameter.
    #[error("Client error: {0}")]
    Client(String),
}

impl From<CodecError> for PlayerError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedCodec(name) => Self::UnsupportedCodec(name),
            other => Self::Decoder(other),
        }
    }
}
