//! Session state machine types.

use serde::{Deserialize, Serialize};

/// The state of the streaming-receiver player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No session is playing.
    #[default]
    Idle,

    /// A session is being decoded and broadcast.
    Active {
        /// Connection address of the sending peer.
        peer: String,

        /// Negotiated codec name.
        codec: String,
    },
}

impl SessionState {
    /// Returns true if no session is playing.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if a session is playing.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Active { .. } => "Active",
        }
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEndReason {
    /// The peer closed the data channel.
    PeerClosed,

    /// `close()` was called.
    Closed,

    /// A newer session took over.
    Superseded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        let state = SessionState::default();
        assert!(state.is_idle());
        assert!(!state.is_active());
        assert_eq!(state.name(), "Idle");
    }

    #[test]
    fn test_active_state() {
        let state = SessionState::Active {
            peer: "10.0.0.2".to_string(),
            codec: "alac".to_string(),
        };
        assert!(state.is_active());
        assert_eq!(state.name(), "Active");
    }
}
