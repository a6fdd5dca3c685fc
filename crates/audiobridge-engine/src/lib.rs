//! Bridge orchestrator for the audio bridge.
//!
//! This crate routes exactly one input (local capture or AirPlay sessions)
//! to any number of outputs, and runs the streaming-receiver player that
//! decodes sessions and drives remote clients.

mod artwork;
mod bridge;
mod client;
mod error;
mod local;
mod metrics;
mod player;
mod raop;

pub use artwork::{gradient_from_image, Color, Gradient, GradientStop};
pub use bridge::{Bridge, InputSource};
pub use client::{ClientId, ControlParam, PlayerClient};
pub use error::{BridgeError, PlayerError};
pub use local::LocalHandler;
pub use metrics::MetricsCollector;
pub use player::Player;
pub use raop::{
    artwork_content_type, dmap_track_info, volume_body, RaopClient, PARAM_QUEUE_CAPACITY,
};

use std::sync::Arc;

use audiobridge_audio::LocalAudioBackend;
use audiobridge_ipc::{BridgeConfig, BridgeEvent};
use crossbeam_channel::Sender;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Result type for player operations.
pub type PlayerResult<T> = Result<T, PlayerError>;

/// Most clients a player fans out to at once.
pub const CLIENT_CAPACITY: usize = 8;

/// Create a bridge that reports to `events`.
pub fn create_bridge(
    config: BridgeConfig,
    backend: Arc<dyn LocalAudioBackend>,
    events: Sender<BridgeEvent>,
) -> Bridge {
    Bridge::new(config, backend).with_events(events)
}
