//! Local capture and playback handlers owned by the bridge.

use std::sync::Arc;

use audiobridge_audio::{ByteSink, CaptureHandler, PlaybackHandler};
use tracing::warn;

/// Pairs the local capture and playback devices. Both are created lazily.
pub struct LocalHandler {
    pub(crate) capture: Option<Box<dyn CaptureHandler>>,
    pub(crate) playback: Option<Box<dyn PlaybackHandler>>,
    /// Playback sink currently registered on the bridge's byte writer.
    pub(crate) wired: Option<Arc<dyn ByteSink>>,
    verbose: bool,
}

impl LocalHandler {
    pub fn new(verbose: bool) -> Self {
        Self {
            capture: None,
            playback: None,
            wired: None,
            verbose,
        }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn has_capture(&self) -> bool {
        self.capture.is_some()
    }

    pub fn has_playback(&self) -> bool {
        self.playback.is_some()
    }

    /// Signal both devices to quit. Does not wait for them.
    ///
    /// Returns the playback sink that was wired, so the caller can
    /// unregister it.
    pub fn stop(&mut self) -> Option<Arc<dyn ByteSink>> {
        if let Some(mut capture) = self.capture.take() {
            warn!("Stopping capture handler...");
            capture.quit();
        }
        if let Some(mut playback) = self.playback.take() {
            warn!("Stopping playback handler...");
            playback.quit();
        }
        self.wired.take()
    }
}
