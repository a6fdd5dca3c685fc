//! Interfaces of the local capture and playback devices.
//!
//! Hardware access lives behind these traits. The bridge only creates
//! handlers, hands capture its writers, and tells handlers to quit.

use std::sync::Arc;

use audiobridge_ipc::AudioDeviceConfig;

use crate::writer::{ByteSink, ByteWriter, IntWriter};
use crate::AudioResult;

/// A running capture device pushing decoded audio into the bridge writers.
pub trait CaptureHandler: Send {
    /// Ask the device to stop. Does not wait for it to exit.
    fn quit(&mut self);
}

/// A running playback device.
pub trait PlaybackHandler: Send {
    /// The sink audio for this device is written to.
    fn sink(&self) -> Arc<dyn ByteSink>;

    /// Ask the device to stop. Does not wait for it to exit.
    fn quit(&mut self);
}

/// Creates capture and playback handlers for local devices.
pub trait LocalAudioBackend: Send + Sync {
    /// Open a capture device that writes every buffer to both writers.
    fn new_capture(
        &self,
        device: &AudioDeviceConfig,
        int_writer: Arc<IntWriter>,
        byte_writer: Arc<ByteWriter>,
        verbose: bool,
    ) -> AudioResult<Box<dyn CaptureHandler>>;

    /// Open the default playback device.
    fn new_playback(&self, verbose: bool) -> AudioResult<Box<dyn PlaybackHandler>>;
}
