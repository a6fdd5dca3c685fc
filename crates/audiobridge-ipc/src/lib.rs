//! Shared types and events for the audio bridge.
//!
//! This crate defines the configuration records, state machine types and
//! events passed between the bridge crates and whoever observes them.

mod events;
mod state;
mod types;

pub use events::BridgeEvent;
pub use state::{SessionEndReason, SessionState};
pub use types::{
    AudioDeviceConfig, AudioDeviceType, BridgeConfig, InputKind, OutputKind, RaopClientConfig,
    SessionMetrics, Track,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for events (bridge → observer).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<BridgeEvent>, Receiver<BridgeEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
