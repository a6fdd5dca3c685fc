//! Sample writer fan-out and local audio interfaces.
//!
//! This crate provides the writers every input pushes decoded audio into,
//! the byte/sample conversions they rely on, and the traits local capture
//! and playback devices implement.

mod error;
mod local;
mod samples;
mod writer;

pub use error::AudioError;
pub use local::{CaptureHandler, LocalAudioBackend, PlaybackHandler};
pub use samples::{bytes_to_samples, sample_from_le_pair, samples_to_bytes, samples_zero_copy};
pub use writer::{
    ByteSink, ByteWriter, ChannelByteSink, ChannelSampleSink, IntWriter, SampleSink,
};

/// Channel capacity for channel-backed sinks.
pub const SINK_CHANNEL_CAPACITY: usize = 8;

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// Sample rate of AirPlay audio in Hz.
pub const SAMPLE_RATE: u32 = 44100;

/// Number of audio channels.
pub const CHANNELS: u16 = 2;
