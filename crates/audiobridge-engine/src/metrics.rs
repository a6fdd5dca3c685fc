//! Per-session counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;

use audiobridge_ipc::SessionMetrics;

/// Collects frame counters for the running session.
///
/// Written by the session thread, read by anyone holding the player.
pub struct MetricsCollector {
    start_time: RwLock<Option<Instant>>,
    frames_received: AtomicU64,
    frames_decoded: AtomicU64,
    frames_muted: AtomicU64,
    frame_faults: AtomicU64,
    bytes_written: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: RwLock::new(None),
            frames_received: AtomicU64::new(0),
            frames_decoded: AtomicU64::new(0),
            frames_muted: AtomicU64::new(0),
            frame_faults: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        }
    }

    /// Reset every counter and start the uptime clock.
    pub fn start(&self) {
        self.frames_received.store(0, Ordering::Relaxed);
        self.frames_decoded.store(0, Ordering::Relaxed);
        self.frames_muted.store(0, Ordering::Relaxed);
        self.frame_faults.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        *self.start_time.write() = Some(Instant::now());
    }

    /// Stop the uptime clock. Counters keep their values.
    pub fn stop(&self) {
        *self.start_time.write() = None;
    }

    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoded(&self, bytes: usize) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_muted(&self) {
        self.frames_muted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fault(&self) {
        self.frame_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> SessionMetrics {
        let uptime_seconds = self
            .start_time
            .read()
            .map(|s| s.elapsed().as_secs())
            .unwrap_or(0);

        SessionMetrics {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_muted: self.frames_muted.load(Ordering::Relaxed),
            frame_faults: self.frame_faults.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            uptime_seconds,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
