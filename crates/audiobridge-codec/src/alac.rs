//! Apple Lossless decoder.

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_ALAC};
use symphonia::core::formats::Packet;
use tracing::{debug, instrument};

use audiobridge_audio::samples_to_bytes;

use crate::error::CodecError;
use crate::{AudioDecoder, CodecKind, CodecResult};

/// ALAC stream parameters as announced in the session `fmtp` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlacConfig {
    pub frame_length: u32,
    pub compatible_version: u8,
    pub bit_depth: u8,
    pub pb: u8,
    pub mb: u8,
    pub kb: u8,
    pub channels: u8,
    pub max_run: u16,
    pub max_frame_bytes: u32,
    pub avg_bit_rate: u32,
    pub sample_rate: u32,
}

impl Default for AlacConfig {
    /// The parameters every AirPlay sender uses in practice.
    fn default() -> Self {
        Self {
            frame_length: 352,
            compatible_version: 0,
            bit_depth: 16,
            pb: 40,
            mb: 10,
            kb: 14,
            channels: 2,
            max_run: 255,
            max_frame_bytes: 0,
            avg_bit_rate: 0,
            sample_rate: 44100,
        }
    }
}

fn field<T: std::str::FromStr>(value: Option<&str>, name: &'static str) -> CodecResult<T> {
    let value = value.ok_or(CodecError::MissingParameter(name))?;
    value
        .parse()
        .map_err(|_| CodecError::InvalidParameter(format!("{}={}", name, value)))
}

impl AlacConfig {
    /// Parse `96 352 0 16 40 10 14 2 255 0 0 44100`.
    pub fn from_fmtp(fmtp: &str) -> CodecResult<Self> {
        let mut parts = fmtp.split_whitespace();
        // Leading payload type.
        parts.next().ok_or(CodecError::MissingParameter("fmtp"))?;

        let config = Self {
            frame_length: field(parts.next(), "frame_length")?,
            compatible_version: field(parts.next(), "compatible_version")?,
            bit_depth: field(parts.next(), "bit_depth")?,
            pb: field(parts.next(), "pb")?,
            mb: field(parts.next(), "mb")?,
            kb: field(parts.next(), "kb")?,
            channels: field(parts.next(), "channels")?,
            max_run: field(parts.next(), "max_run")?,
            max_frame_bytes: field(parts.next(), "max_frame_bytes")?,
            avg_bit_rate: field(parts.next(), "avg_bit_rate")?,
            sample_rate: field(parts.next(), "sample_rate")?,
        };

        if config.bit_depth != 16 {
            return Err(CodecError::InvalidParameter(format!(
                "bit_depth={} (only 16 is supported)",
                config.bit_depth
            )));
        }
        if config.channels == 0 || config.frame_length == 0 {
            return Err(CodecError::InvalidParameter(format!(
                "channels={} frame_length={}",
                config.channels, config.frame_length
            )));
        }

        Ok(config)
    }

    /// The 24-byte `ALACSpecificConfig` the decoder is initialized from.
    pub fn magic_cookie(&self) -> [u8; 24] {
        let mut cookie = [0u8; 24];
        cookie[0..4].copy_from_slice(&self.frame_length.to_be_bytes());
        cookie[4] = self.compatible_version;
        cookie[5] = self.bit_depth;
        cookie[6] = self.pb;
        cookie[7] = self.mb;
        cookie[8] = self.kb;
        cookie[9] = self.channels;
        cookie[10..12].copy_from_slice(&self.max_run.to_be_bytes());
        cookie[12..16].copy_from_slice(&self.max_frame_bytes.to_be_bytes());
        cookie[16..20].copy_from_slice(&self.avg_bit_rate.to_be_bytes());
        cookie[20..24].copy_from_slice(&self.sample_rate.to_be_bytes());
        cookie
    }
}

/// ALAC decoder bound to one session.
pub struct AlacDecoder {
    decoder: Box<dyn Decoder>,
    config: AlacConfig,
    frames_decoded: u64,
}

impl AlacDecoder {
    /// Create a decoder for the given stream parameters.
    #[instrument(name = "alac_new", skip_all)]
    pub fn new(config: AlacConfig) -> CodecResult<Self> {
        debug!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            frame_length = config.frame_length,
            "Initializing ALAC decoder"
        );

        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_ALAC)
            .with_sample_rate(config.sample_rate)
            .with_max_frames_per_packet(config.frame_length as u64)
            .with_extra_data(config.magic_cookie().to_vec().into_boxed_slice());

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| CodecError::Initialization(format!("ALAC: {}", e)))?;

        Ok(Self {
            decoder,
            config,
            frames_decoded: 0,
        })
    }

    pub fn config(&self) -> &AlacConfig {
        &self.config
    }
}

impl AudioDecoder for AlacDecoder {
    fn decode(&mut self, frame: &[u8]) -> CodecResult<Vec<u8>> {
        if frame.is_empty() {
            return Err(CodecError::InvalidFrame("empty ALAC frame".to_string()));
        }

        let ts = self.frames_decoded * self.config.frame_length as u64;
        let packet = Packet::new_from_slice(0, ts, self.config.frame_length as u64, frame);

        let decoded = self
            .decoder
            .decode(&packet)
            .map_err(|e| CodecError::Decoding(e.to_string()))?;

        let spec = *decoded.spec();
        let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);

        self.frames_decoded += 1;
        Ok(samples_to_bytes(samples.samples()))
    }

    fn kind(&self) -> CodecKind {
        CodecKind::Alac
    }

    fn name(&self) -> &'static str {
        "alac"
    }
}
