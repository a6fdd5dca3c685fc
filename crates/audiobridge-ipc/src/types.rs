//! Common types shared between the bridge crates.

use serde::{Deserialize, Serialize};

/// Bridge-wide configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Log every setup step at `info` instead of `debug`.
    pub verbose: bool,

    /// Reinterpret decoded PCM as samples in place when the platform
    /// layout allows it, instead of copying.
    pub zero_copy_samples: bool,
}

/// A local audio device as handed to the capture collaborator.
///
/// The bridge never interprets these fields; they are forwarded as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDeviceConfig {
    /// Unique identifier for this device.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Type of audio device.
    pub device_type: AudioDeviceType,

    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Number of channels.
    pub channels: u16,
}

impl Default for AudioDeviceConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            device_type: AudioDeviceType::Input,
            sample_rate: 44100,
            channels: 2,
        }
    }
}

/// Where to reach a remote AirPlay receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaopClientConfig {
    /// Receiver host name or IP.
    pub address: String,

    /// RTSP control port.
    pub control_port: u16,

    /// UDP port audio is sent to.
    pub data_port: u16,

    /// Request URI used for control requests.
    pub uri: String,
}

impl Default for RaopClientConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            control_port: 5000,
            data_port: 6000,
            uri: "rtsp://127.0.0.1/1".to_string(),
        }
    }
}

/// Type of audio device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AudioDeviceType {
    /// Input device (microphone, line in).
    Input,

    /// Output device (for loopback capture).
    Output,
}

/// Which source feeds the bridge.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum InputKind {
    /// No input configured yet.
    #[default]
    Unset,

    /// Local capture device.
    Local,

    /// AirPlay streaming-receiver sessions.
    AirPlay,
}

impl InputKind {
    /// Returns true once an input has been chosen.
    pub fn is_set(self) -> bool {
        !matches!(self, Self::Unset)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Local => "local",
            Self::AirPlay => "airplay",
        }
    }
}

/// Kinds of output the bridge can feed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputKind {
    /// Local playback device.
    Local,

    /// Remote AirPlay client.
    AirPlay,
}

/// Metadata of the track currently playing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub artist: String,
    pub album: String,
    pub title: String,

    /// Raw artwork image bytes (PNG or JPEG), empty when unknown.
    #[serde(skip)]
    pub artwork: Vec<u8>,
}

/// Counters for one streaming session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Encoded frames taken off the data channel.
    pub frames_received: u64,

    /// Frames decoded and written to the fan-out.
    pub frames_decoded: u64,

    /// Frames discarded because the player was muted.
    pub frames_muted: u64,

    /// Frames dropped because decoding or writing failed.
    pub frame_faults: u64,

    /// PCM bytes written to the raw-byte fan-out.
    pub bytes_written: u64,

    /// Session uptime in seconds.
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_config_defaults() {
        let config = AudioDeviceConfig::default();
        assert_eq!(config.device_type, AudioDeviceType::Input);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.channels, 2);
    }

    #[test]
    fn test_raop_config_defaults() {
        let config = RaopClientConfig::default();
        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.control_port, 5000);
        assert_eq!(config.data_port, 6000);
        assert_eq!(config.uri, "rtsp://127.0.0.1/1");
    }
}
