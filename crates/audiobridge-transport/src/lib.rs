//! RTSP transport for AirPlay sessions.
//!
//! This crate provides the request/response client used to negotiate and
//! control sessions with a remote receiver, the text wire codec behind it,
//! and the SDP-described [`Session`] the player consumes.

mod client;
mod error;
mod message;
mod session;

pub use client::RtspClient;
pub use error::TransportError;
pub use message::{
    read_request, read_response, Method, Request, Response, CONTENT_LENGTH_HEADER,
    CONTENT_TYPE_HEADER, CSEQ_HEADER,
};
pub use session::{ConnectData, MediaDescription, Session, SessionDescription};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Protocol token on request and status lines.
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// Port used when an `rtsp://` URL does not name one.
pub const DEFAULT_RTSP_PORT: u16 = 554;

/// Client identification header name.
pub const USER_AGENT_HEADER: &str = "User-Agent";

/// Client identification sent with every request.
pub const USER_AGENT: &str = "AudioBridge/1.0";

/// Largest message body accepted from a peer.
pub const MAX_BODY_LEN: usize = 4 * 1024 * 1024;

/// Longest status, request or header line accepted from a peer.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Channel capacity for encoded frames of one session.
pub const SESSION_CHANNEL_CAPACITY: usize = 64;
