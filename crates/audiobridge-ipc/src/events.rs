//! Events emitted by the bridge.

use serde::{Deserialize, Serialize};

use crate::state::SessionEndReason;
use crate::types::{InputKind, OutputKind, SessionMetrics, Track};

/// Events that the bridge and its player report to an observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BridgeEvent {
    /// The input source was configured.
    InputStarted(InputKind),

    /// An output was wired into the active input.
    OutputAdded(OutputKind),

    /// A streaming session started.
    SessionStarted {
        /// Connection address of the sending peer.
        peer: String,

        /// Negotiated codec name.
        codec: String,
    },

    /// A streaming session ended.
    SessionEnded {
        peer: String,
        reason: SessionEndReason,
        metrics: SessionMetrics,
    },

    /// Track metadata changed.
    TrackChanged(Track),

    /// The bridge was stopped.
    Stopped,
}
