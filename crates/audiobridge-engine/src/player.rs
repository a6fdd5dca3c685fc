//! Streaming-receiver player.
//!
//! A [`Player`] decodes one session at a time on its own thread and pushes
//! the PCM into the bridge writers. Control calls (volume, mute, track,
//! artwork) update player state and are broadcast to every attached
//! client in registration order.
//!
//! Mute and volume are read by the session thread once per frame without
//! further synchronization, so a change takes effect at the latest on the
//! frame after the one in flight.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use audiobridge_audio::{bytes_to_samples, samples_zero_copy, ByteWriter, IntWriter};
use audiobridge_codec::{normalize_audio, select_decoder, volume_to_db, AudioDecoder};
use audiobridge_ipc::{BridgeEvent, SessionEndReason, SessionMetrics, SessionState, Track};
use audiobridge_transport::Session;

use crate::artwork::{gradient_from_image, Gradient};
use crate::client::{ClientId, ClientRegistry, ControlParam, PlayerClient};
use crate::error::PlayerError;
use crate::metrics::MetricsCollector;
use crate::{PlayerResult, CLIENT_CAPACITY};

/// State shared between the player and its session thread.
struct Shared {
    int_writer: Arc<IntWriter>,
    byte_writer: Arc<ByteWriter>,
    muted: AtomicBool,
    /// `f64` bits.
    volume: AtomicU64,
    track: RwLock<Track>,
    clients: ClientRegistry,
    state: RwLock<SessionState>,
    metrics: MetricsCollector,
    events: Option<Sender<BridgeEvent>>,
    zero_copy: bool,
}

impl Shared {
    fn volume(&self) -> f64 {
        f64::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Decode, normalize and fan out one frame.
    fn process_frame(&self, decoder: &mut dyn AudioDecoder, frame: &[u8]) -> PlayerResult<()> {
        let mut pcm = decoder
            .decode(frame)
            .map_err(|e| PlayerError::Frame(e.to_string()))?;
        if pcm.len() % 2 != 0 {
            return Err(PlayerError::Frame(format!(
                "decoder produced {} bytes",
                pcm.len()
            )));
        }

        normalize_audio(&mut pcm, self.volume());
        self.byte_writer.write(&pcm);

        match self.zero_copy.then(|| samples_zero_copy(&pcm)).flatten() {
            Some(samples) => {
                self.int_writer.write(samples);
            }
            None => {
                let samples =
                    bytes_to_samples(&pcm).map_err(|e| PlayerError::Frame(e.to_string()))?;
                self.int_writer.write(&samples);
            }
        }

        self.metrics.record_decoded(pcm.len());
        Ok(())
    }

    fn broadcast(&self, param: ControlParam) {
        for entry in self.clients.snapshot() {
            if let Err(e) = entry.client.set_param(&param) {
                warn!(
                    client = %entry.id,
                    name = entry.client.name(),
                    "Failed to send {}: {}",
                    param.name(),
                    e
                );
            }
        }
    }

    fn send_event(&self, event: BridgeEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.try_send(event) {
                warn!("Failed to send event: {}", e);
            }
        }
    }
}

/// The running session's thread and the means to stop it.
struct SessionHandle {
    peer: String,
    quit: Sender<SessionEndReason>,
    active: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl SessionHandle {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Ask the thread to finish its current frame and exit, then join it.
    fn stop(self, reason: SessionEndReason) {
        // The thread may already be gone; then there is nobody to tell.
        let _ = self.quit.try_send(reason);
        if self.thread.join().is_err() {
            warn!(peer = %self.peer, "Session thread panicked");
        }
    }
}

/// Marks the session idle when dropped, including when the session
/// thread unwinds.
struct IdleOnDrop<'a> {
    shared: &'a Shared,
    active: &'a AtomicBool,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.shared.metrics.stop();
        *self.shared.state.write() = SessionState::Idle;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

enum Next {
    Frame(Bytes),
    End(SessionEndReason),
}

fn session_loop(
    shared: &Shared,
    session: Session,
    mut decoder: Box<dyn AudioDecoder>,
    quit: Receiver<SessionEndReason>,
    active: &AtomicBool,
) {
    let peer = session.peer().to_string();
    debug!(peer = %peer, codec = decoder.name(), "Session loop starting");
    let idle = IdleOnDrop { shared, active };

    let reason = loop {
        let next = select! {
            recv(session.frames) -> frame => match frame {
                Ok(frame) => Next::Frame(frame),
                Err(_) => Next::End(SessionEndReason::PeerClosed),
            },
            recv(quit) -> reason => Next::End(reason.unwrap_or(SessionEndReason::Closed)),
        };

        let frame = match next {
            Next::Frame(frame) => frame,
            Next::End(reason) => break reason,
        };

        shared.metrics.record_received();
        if shared.muted.load(Ordering::Relaxed) {
            shared.metrics.record_muted();
            continue;
        }

        // Sinks and decoders are outside code; a panic costs one frame.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            shared.process_frame(decoder.as_mut(), &frame)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                shared.metrics.record_fault();
                warn!(peer = %peer, "Dropping frame: {}", e);
            }
            Err(payload) => {
                shared.metrics.record_fault();
                warn!(
                    peer = %peer,
                    "Frame processing panicked: {}",
                    panic_message(&*payload)
                );
            }
        }
    };

    drop(idle);

    let metrics = shared.metrics.snapshot();
    info!(
        peer = %peer,
        ?reason,
        received = metrics.frames_received,
        faults = metrics.frame_faults,
        "Session with peer '{}' closed",
        peer
    );
    shared.send_event(BridgeEvent::SessionEnded {
        peer,
        reason,
        metrics,
    });
}

/// Plays streaming-receiver sessions into the bridge writers.
pub struct Player {
    shared: Arc<Shared>,
    session: Mutex<Option<SessionHandle>>,
}

impl Player {
    pub fn new(int_writer: Arc<IntWriter>, byte_writer: Arc<ByteWriter>) -> Self {
        Self::with_options(int_writer, byte_writer, None, false)
    }

    /// Create a player that reports to `events` and optionally hands
    /// decoded PCM to sample sinks without copying.
    pub fn with_options(
        int_writer: Arc<IntWriter>,
        byte_writer: Arc<ByteWriter>,
        events: Option<Sender<BridgeEvent>>,
        zero_copy: bool,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                int_writer,
                byte_writer,
                muted: AtomicBool::new(false),
                volume: AtomicU64::new(1.0f64.to_bits()),
                track: RwLock::new(Track::default()),
                clients: ClientRegistry::new(CLIENT_CAPACITY),
                state: RwLock::new(SessionState::Idle),
                metrics: MetricsCollector::new(),
                events,
                zero_copy,
            }),
            session: Mutex::new(None),
        }
    }

    /// Start decoding `session`.
    ///
    /// A session that is still playing is stopped and joined first. When
    /// no decoder exists for the session's codec the error is returned and
    /// the current session, if any, keeps playing.
    #[instrument(name = "player_play", skip(self, session), fields(peer = %session.peer()))]
    pub fn play(&self, session: Session) -> PlayerResult<()> {
        let decoder = select_decoder(&session.description)?;
        let codec = decoder.kind().name().to_string();
        let peer = session.peer().to_string();

        let mut current = self.session.lock();
        if let Some(previous) = current.take() {
            if previous.is_active() {
                info!(previous = %previous.peer, "Superseding active session");
            }
            previous.stop(SessionEndReason::Superseded);
        }

        info!(codec = %codec, "Starting new session");
        self.shared.metrics.start();
        *self.shared.state.write() = SessionState::Active {
            peer: peer.clone(),
            codec: codec.clone(),
        };

        self.shared.send_event(BridgeEvent::SessionStarted {
            peer: peer.clone(),
            codec,
        });

        let active = Arc::new(AtomicBool::new(true));
        let (quit_tx, quit_rx) = crossbeam_channel::bounded(1);

        let shared = Arc::clone(&self.shared);
        let thread_active = Arc::clone(&active);
        let spawned = thread::Builder::new()
            .name("airplay-session".to_string())
            .spawn(move || session_loop(&shared, session, decoder, quit_rx, &thread_active));

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                *self.shared.state.write() = SessionState::Idle;
                self.shared.metrics.stop();
                return Err(PlayerError::Spawn(e));
            }
        };

        *current = Some(SessionHandle {
            peer,
            quit: quit_tx,
            active,
            thread,
        });
        Ok(())
    }

    /// Stop the active session after its in-flight frame.
    ///
    /// Does nothing when no session is active.
    #[instrument(name = "player_close", skip(self))]
    pub fn close(&self) {
        let mut current = self.session.lock();
        if !current.as_ref().is_some_and(SessionHandle::is_active) {
            debug!("No active session");
            return;
        }
        if let Some(handle) = current.take() {
            handle.stop(SessionEndReason::Closed);
        }
    }

    pub fn is_active(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(SessionHandle::is_active)
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.read().clone()
    }

    /// Counters of the current or most recent session.
    pub fn metrics(&self) -> SessionMetrics {
        self.shared.metrics.snapshot()
    }

    /// Attach a remote client. It receives control parameters and, through
    /// the byte writer, the decoded PCM.
    #[instrument(name = "player_add_client", skip_all, fields(name = client.name()))]
    pub fn add_client<C: PlayerClient + 'static>(&self, client: Arc<C>) -> PlayerResult<ClientId> {
        let entry = self.shared.clients.add(client)?;
        self.shared.byte_writer.append_writer(entry.sink.clone());
        info!(client = %entry.id, "Client attached");
        Ok(entry.id)
    }

    /// Remove a client from the registry and from the byte writer.
    #[instrument(name = "player_detach_client", skip(self))]
    pub fn detach_client(&self, id: ClientId) -> PlayerResult<()> {
        let entry = self.shared.clients.remove(id)?;
        self.shared.byte_writer.remove_writer(&entry.sink);
        info!(name = entry.client.name(), "Client detached");
        Ok(())
    }

    pub fn client_count(&self) -> usize {
        self.shared.clients.len()
    }

    pub fn client_capacity(&self) -> usize {
        self.shared.clients.capacity()
    }

    /// Set the linear volume in `0.0..=1.0`.
    pub fn set_volume(&self, volume: f64) {
        self.shared
            .volume
            .store(volume.to_bits(), Ordering::Relaxed);
        if !self.shared.clients.is_empty() {
            self.shared
                .broadcast(ControlParam::Volume(volume_to_db(volume)));
        }
    }

    pub fn volume(&self) -> f64 {
        self.shared.volume()
    }

    pub fn set_mute(&self, muted: bool) {
        self.shared.muted.store(muted, Ordering::Relaxed);
        if !self.shared.clients.is_empty() {
            self.shared.broadcast(ControlParam::Muted(muted));
        }
        if muted {
            info!("Muting stream...");
        }
    }

    pub fn is_muted(&self) -> bool {
        self.shared.muted.load(Ordering::Relaxed)
    }

    pub fn set_track(&self, album: &str, artist: &str, title: &str) {
        let track = {
            let mut track = self.shared.track.write();
            track.album = album.to_string();
            track.artist = artist.to_string();
            track.title = title.to_string();
            track.clone()
        };

        if !self.shared.clients.is_empty() {
            self.shared.broadcast(ControlParam::TrackInfo {
                album: track.album.clone(),
                artist: track.artist.clone(),
                title: track.title.clone(),
            });
        }
        self.shared.send_event(BridgeEvent::TrackChanged(track));
    }

    pub fn set_album_art(&self, artwork: impl Into<Bytes>) {
        let artwork: Bytes = artwork.into();
        self.shared.track.write().artwork = artwork.to_vec();
        if !self.shared.clients.is_empty() {
            self.shared.broadcast(ControlParam::AlbumArt(artwork));
        }
    }

    pub fn get_track(&self) -> Track {
        self.shared.track.read().clone()
    }

    /// Gradient of the stored artwork with `resolution` stops.
    pub fn gradient_from_artwork(&self, resolution: usize) -> PlayerResult<Gradient> {
        let artwork = self.shared.track.read().artwork.clone();
        gradient_from_image(&artwork, resolution)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close();
    }
}
