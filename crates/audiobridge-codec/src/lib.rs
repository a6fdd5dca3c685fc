//! Audio decoding and volume processing.
//!
//! This crate turns the encoded frames of a negotiated session into
//! little-endian 16-bit PCM, and owns the volume mapping shared by local
//! gain and remote receivers.

mod alac;
mod error;
mod pcm;
mod volume;

pub use alac::{AlacConfig, AlacDecoder};
pub use error::CodecError;
pub use pcm::PcmDecoder;
pub use volume::{
    db_to_gain, normalize_audio, volume_to_db, volume_to_gain, MUTED_VOLUME_DB, VOLUME_RANGE_DB,
};

use std::fmt;

use audiobridge_transport::SessionDescription;
use tracing::debug;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Codecs a session can negotiate that we know how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    /// Apple Lossless.
    Alac,
    /// Uncompressed big-endian 16-bit PCM.
    Pcm,
}

impl CodecKind {
    /// Identify the codec from an `rtpmap` value such as `96 AppleLossless`
    /// or `96 L16/44100/2`.
    pub fn from_rtpmap(rtpmap: &str) -> CodecResult<Self> {
        let encoding = rtpmap
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| CodecError::InvalidParameter(format!("rtpmap={}", rtpmap)))?;
        let name = encoding.split('/').next().unwrap_or(encoding);

        if name.eq_ignore_ascii_case("AppleLossless") {
            Ok(Self::Alac)
        } else if name.eq_ignore_ascii_case("L16") {
            Ok(Self::Pcm)
        } else {
            Err(CodecError::UnsupportedCodec(name.to_string()))
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Alac => "alac",
            Self::Pcm => "pcm",
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait for session audio decoders.
pub trait AudioDecoder: Send {
    /// Decode one frame into interleaved little-endian 16-bit PCM.
    fn decode(&mut self, frame: &[u8]) -> CodecResult<Vec<u8>>;

    /// The codec this decoder handles.
    fn kind(&self) -> CodecKind;

    /// Get decoder name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Create the decoder a session's description calls for.
pub fn select_decoder(description: &SessionDescription) -> CodecResult<Box<dyn AudioDecoder>> {
    let rtpmap = description
        .rtpmap()
        .ok_or(CodecError::MissingParameter("rtpmap"))?;

    match CodecKind::from_rtpmap(rtpmap)? {
        CodecKind::Alac => {
            let config = match description.fmtp() {
                Some(fmtp) => AlacConfig::from_fmtp(fmtp)?,
                None => AlacConfig::default(),
            };
            debug!(?config, "Selected ALAC decoder");
            Ok(Box::new(AlacDecoder::new(config)?))
        }
        CodecKind::Pcm => {
            debug!("Selected PCM decoder");
            Ok(Box::new(PcmDecoder::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_from_rtpmap() {
        assert_eq!(
            CodecKind::from_rtpmap("96 AppleLossless").unwrap(),
            CodecKind::Alac
        );
        assert_eq!(
            CodecKind::from_rtpmap("96 L16/44100/2").unwrap(),
            CodecKind::Pcm
        );
        assert!(matches!(
            CodecKind::from_rtpmap("96 mpeg4-generic/44100/2"),
            Err(CodecError::UnsupportedCodec(name)) if name == "mpeg4-generic"
        ));
        assert!(matches!(
            CodecKind::from_rtpmap("96"),
            Err(CodecError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_select_decoder() {
        let description = SessionDescription::new()
            .with_attribute("rtpmap", "96 AppleLossless")
            .with_attribute("fmtp", "96 352 0 16 40 10 14 2 255 0 0 44100");
        let decoder = select_decoder(&description).unwrap();
        assert_eq!(decoder.kind(), CodecKind::Alac);

        let description = SessionDescription::new().with_attribute("rtpmap", "96 L16/44100/2");
        let decoder = select_decoder(&description).unwrap();
        assert_eq!(decoder.kind(), CodecKind::Pcm);
    }

    #[test]
    fn test_select_decoder_errors() {
        let description = SessionDescription::new();
        assert!(matches!(
            select_decoder(&description),
            Err(CodecError::MissingParameter("rtpmap"))
        ));

        let description =
            SessionDescription::new().with_attribute("rtpmap", "96 mpeg4-generic/44100/2");
        assert!(matches!(
            select_decoder(&description),
            Err(CodecError::UnsupportedCodec(_))
        ));
    }
}
