//! Negotiated streaming sessions and their SDP descriptions.

use std::collections::BTreeMap;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::{TransportResult, SESSION_CHANNEL_CAPACITY};

/// The `c=` line of a session description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectData {
    pub network_type: String,
    pub address_type: String,
    pub connection_address: String,
}

/// One `m=` line of a session description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescription {
    pub media: String,
    pub port: u16,
    pub protocol: String,
    pub formats: Vec<String>,
}

/// The subset of SDP that AirPlay senders announce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub version: u32,
    pub origin: String,
    pub session_name: String,
    pub connect_data: ConnectData,
    pub media: Vec<MediaDescription>,

    /// `a=` attributes keyed by name. Flag attributes map to "".
    pub attributes: BTreeMap<String, String>,
}

impl SessionDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an SDP body.
    pub fn parse(text: &str) -> TransportResult<Self> {
        let mut description = Self::default();

        for raw in text.lines() {
            let line = raw.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let (kind, value) = line
                .split_once('=')
                .ok_or_else(|| TransportError::Protocol(format!("malformed SDP line: {}", line)))?;

            match kind {
                "v" => {
                    description.version = value.trim().parse().map_err(|_| {
                        TransportError::Protocol(format!("bad SDP version: {}", value))
                    })?;
                }
                "o" => description.origin = value.to_string(),
                "s" => description.session_name = value.to_string(),
                "c" => description.connect_data = parse_connect_data(value)?,
                "m" => description.media.push(parse_media(value)?),
                "a" => {
                    let (name, attr) = value.split_once(':').unwrap_or((value, ""));
                    description
                        .attributes
                        .insert(name.to_string(), attr.to_string());
                }
                // Timing, bandwidth and the rest are not needed to play audio.
                _ => {}
            }
        }

        Ok(description)
    }

    pub fn with_connection_address(mut self, address: impl Into<String>) -> Self {
        self.connect_data = ConnectData {
            network_type: "IN".to_string(),
            address_type: "IP4".to_string(),
            connection_address: address.into(),
        };
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Look up an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Address of the sending peer.
    pub fn connection_address(&self) -> &str {
        &self.connect_data.connection_address
    }

    /// The `rtpmap` attribute, e.g. `96 AppleLossless`.
    pub fn rtpmap(&self) -> Option<&str> {
        self.attribute("rtpmap")
    }

    /// The `fmtp` attribute, e.g. `96 352 0 16 40 10 14 2 255 0 0 44100`.
    pub fn fmtp(&self) -> Option<&str> {
        self.attribute("fmtp")
    }
}

fn parse_connect_data(value: &str) -> TransportResult<ConnectData> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(network_type), Some(address_type), Some(address)) => Ok(ConnectData {
            network_type: network_type.to_string(),
            address_type: address_type.to_string(),
            // Multicast addresses may carry a "/ttl" suffix.
            connection_address: address.split('/').next().unwrap_or(address).to_string(),
        }),
        _ => Err(TransportError::Protocol(format!(
            "malformed SDP connection line: {}",
            value
        ))),
    }
}

fn parse_media(value: &str) -> TransportResult<MediaDescription> {
    let mut parts = value.split_whitespace();
    let media = parts.next();
    let port = parts.next().and_then(|p| p.split('/').next()?.parse::<u16>().ok());
    let protocol = parts.next();

    match (media, port, protocol) {
        (Some(media), Some(port), Some(protocol)) => Ok(MediaDescription {
            media: media.to_string(),
            port,
            protocol: protocol.to_string(),
            formats: parts.map(str::to_string).collect(),
        }),
        _ => Err(TransportError::Protocol(format!(
            "malformed SDP media line: {}",
            value
        ))),
    }
}

/// A negotiated streaming session.
///
/// The frame channel delivers decrypted, still-encoded audio frames in
/// receipt order. The session ends when every sender is dropped.
#[derive(Debug)]
pub struct Session {
    pub description: SessionDescription,
    pub frames: Receiver<Bytes>,
}

impl Session {
    pub fn new(description: SessionDescription, frames: Receiver<Bytes>) -> Self {
        Self {
            description,
            frames,
        }
    }

    /// Create a session together with the sender that feeds it frames.
    pub fn channel(description: SessionDescription) -> (Sender<Bytes>, Self) {
        let (sender, receiver) = crossbeam_channel::bounded(SESSION_CHANNEL_CAPACITY);
        (sender, Self::new(description, receiver))
    }

    /// Address of the sending peer.
    pub fn peer(&self) -> &str {
        self.description.connection_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANNOUNCE_SDP: &str = "v=0\r\n\
        o=iTunes 3413821438 0 IN IP4 10.0.0.5\r\n\
        s=iTunes\r\n\
        c=IN IP4 10.0.0.5\r\n\
        t=0 0\r\n\
        m=audio 0 RTP/AVP 96\r\n\
        a=rtpmap:96 AppleLossless\r\n\
        a=fmtp:96 352 0 16 40 10 14 2 255 0 0 44100\r\n\
        a=recvonly\r\n";

    #[test]
    fn test_parse_announce() {
        let sdp = SessionDescription::parse(ANNOUNCE_SDP).unwrap();

        assert_eq!(sdp.version, 0);
        assert_eq!(sdp.session_name, "iTunes");
        assert_eq!(sdp.connection_address(), "10.0.0.5");
        assert_eq!(sdp.rtpmap(), Some("96 AppleLossless"));
        assert_eq!(sdp.fmtp(), Some("96 352 0 16 40 10 14 2 255 0 0 44100"));
        assert_eq!(sdp.attribute("recvonly"), Some(""));

        assert_eq!(sdp.media.len(), 1);
        assert_eq!(sdp.media[0].media, "audio");
        assert_eq!(sdp.media[0].protocol, "RTP/AVP");
        assert_eq!(sdp.media[0].formats, vec!["96".to_string()]);
    }

    #[test]
    fn test_parse_rejects_malformed_line() {
        let err = SessionDescription::parse("v=0\r\nnonsense\r\n").unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[test]
    fn test_multicast_ttl_stripped() {
        let sdp = SessionDescription::parse("c=IN IP4 224.2.1.1/127\r\n").unwrap();
        assert_eq!(sdp.connection_address(), "224.2.1.1");
    }

    #[test]
    fn test_session_channel_delivers_frames() {
        let description = SessionDescription::new().with_connection_address("10.0.0.9");
        let (tx, session) = Session::channel(description);

        tx.send(Bytes::from_static(&[1, 2, 3])).unwrap();
        drop(tx);

        assert_eq!(session.peer(), "10.0.0.9");
        assert_eq!(session.frames.recv().unwrap().as_ref(), &[1, 2, 3]);
        assert!(session.frames.recv().is_err());
    }
}
