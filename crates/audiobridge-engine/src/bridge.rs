//! The bridge: exactly one input, any number of outputs.

use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, info, instrument, warn};

use audiobridge_audio::{ByteSink, ByteWriter, IntWriter, LocalAudioBackend};
use audiobridge_ipc::{AudioDeviceConfig, BridgeConfig, BridgeEvent, InputKind, OutputKind};
use audiobridge_transport::Session;

use crate::client::{ClientId, PlayerClient};
use crate::error::BridgeError;
use crate::local::LocalHandler;
use crate::player::Player;
use crate::BridgeResult;

/// What feeds the bridge.
#[derive(Debug)]
pub enum InputSource {
    /// A local capture device.
    Local(AudioDeviceConfig),

    /// AirPlay sessions, optionally starting with one already negotiated.
    AirPlay(Option<Session>),
}

impl InputSource {
    pub fn kind(&self) -> InputKind {
        match self {
            Self::Local(_) => InputKind::Local,
            Self::AirPlay(_) => InputKind::AirPlay,
        }
    }
}

/// Setup steps are `info` when verbose, `debug` otherwise.
fn step(verbose: bool, message: &str) {
    if verbose {
        info!("{}", message);
    } else {
        debug!("{}", message);
    }
}

/// Routes one input source to local and remote outputs.
///
/// Every input writes into the same pair of writers; outputs are wired in
/// by registering them as sinks on those writers.
pub struct Bridge {
    config: BridgeConfig,
    input: InputKind,
    local: Option<LocalHandler>,
    player: Option<Arc<Player>>,
    int_writer: Arc<IntWriter>,
    byte_writer: Arc<ByteWriter>,
    backend: Arc<dyn LocalAudioBackend>,
    events: Option<Sender<BridgeEvent>>,
}

impl Bridge {
    pub fn new(config: BridgeConfig, backend: Arc<dyn LocalAudioBackend>) -> Self {
        Self {
            config,
            input: InputKind::Unset,
            local: None,
            player: None,
            int_writer: Arc::new(IntWriter::new()),
            byte_writer: Arc::new(ByteWriter::new()),
            backend,
            events: None,
        }
    }

    /// Report setup and session events on `events`.
    pub fn with_events(mut self, events: Sender<BridgeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn input(&self) -> InputKind {
        self.input
    }

    pub fn int_writer(&self) -> &Arc<IntWriter> {
        &self.int_writer
    }

    pub fn byte_writer(&self) -> &Arc<ByteWriter> {
        &self.byte_writer
    }

    pub fn local(&self) -> Option<&LocalHandler> {
        self.local.as_ref()
    }

    /// The player, once an AirPlay input or output exists.
    pub fn player(&self) -> Option<Arc<Player>> {
        self.player.clone()
    }

    /// Choose the input. Only the first call on a bridge can succeed.
    #[instrument(name = "bridge_start_input", skip_all, fields(kind = source.kind().name()))]
    pub fn start_input(&mut self, source: InputSource) -> BridgeResult<()> {
        match source {
            InputSource::Local(device) => self.start_local_input(&device),
            InputSource::AirPlay(session) => {
                self.start_airplay_input()?;
                if let Some(session) = session {
                    self.play_session(session)?;
                }
                Ok(())
            }
        }
    }

    /// Use a local capture device as the input.
    ///
    /// The input stays claimed when the device fails to open.
    pub fn start_local_input(&mut self, device: &AudioDeviceConfig) -> BridgeResult<()> {
        self.claim_input(InputKind::Local)?;

        let verbose = self.config.verbose;
        let local = self
            .local
            .get_or_insert_with(|| LocalHandler::new(verbose));

        if local.capture.is_none() {
            step(verbose, "Initializing new capture handler...");
            let capture = self
                .backend
                .new_capture(
                    device,
                    Arc::clone(&self.int_writer),
                    Arc::clone(&self.byte_writer),
                    verbose,
                )
                .map_err(BridgeError::Initialization)?;
            local.capture = Some(capture);
        }

        self.send_event(BridgeEvent::InputStarted(InputKind::Local));
        Ok(())
    }

    /// Use AirPlay sessions as the input. Returns the player sessions are
    /// handed to.
    pub fn start_airplay_input(&mut self) -> BridgeResult<Arc<Player>> {
        self.claim_input(InputKind::AirPlay)?;
        step(self.config.verbose, "Initializing AirPlay player...");
        let player = self.ensure_player();

        self.send_event(BridgeEvent::InputStarted(InputKind::AirPlay));
        Ok(player)
    }

    /// Start playing a negotiated session.
    pub fn play_session(&self, session: Session) -> BridgeResult<()> {
        if self.input != InputKind::AirPlay {
            return Err(BridgeError::Wiring(format!(
                "sessions need an AirPlay input, input is {}",
                self.input.name()
            )));
        }
        let player = self
            .player
            .as_ref()
            .ok_or_else(|| BridgeError::Wiring("no player".to_string()))?;
        player.play(session)?;
        Ok(())
    }

    /// Play the active input on the local playback device.
    ///
    /// Calling this again re-wires the same device without adding it twice.
    #[instrument(name = "bridge_add_local_output", skip(self))]
    pub fn add_local_output(&mut self) -> BridgeResult<()> {
        let verbose = self.config.verbose;
        let local = self
            .local
            .get_or_insert_with(|| LocalHandler::new(verbose));

        if local.playback.is_none() {
            step(verbose, "Initializing new playback handler...");
            let playback = self
                .backend
                .new_playback(verbose)
                .map_err(BridgeError::Initialization)?;
            local.playback = Some(playback);
        }

        let sink = local
            .playback
            .as_ref()
            .map(|playback| playback.sink())
            .ok_or_else(|| BridgeError::Wiring("no playback handler".to_string()))?;

        step(verbose, "Wiring local playback output to existing source...");
        self.wire_output(Arc::clone(&sink))?;
        if let Some(local) = self.local.as_mut() {
            local.wired = Some(sink);
        }

        self.send_event(BridgeEvent::OutputAdded(OutputKind::Local));
        Ok(())
    }

    /// Send the active input to a remote AirPlay client.
    #[instrument(name = "bridge_add_airplay_output", skip_all, fields(name = client.name()))]
    pub fn add_airplay_output<C: PlayerClient + 'static>(
        &mut self,
        client: Arc<C>,
    ) -> BridgeResult<ClientId> {
        self.require_input()?;
        let player = self.ensure_player();
        let id = player.add_client(client)?;

        self.send_event(BridgeEvent::OutputAdded(OutputKind::AirPlay));
        Ok(id)
    }

    /// Signal every device to stop and close the active session.
    ///
    /// Safe to call at any time, including repeatedly.
    #[instrument(name = "bridge_stop", skip(self))]
    pub fn stop(&mut self) {
        match self.local.as_mut() {
            Some(local) => {
                if let Some(sink) = local.stop() {
                    self.byte_writer.remove_writer(&sink);
                }
            }
            None => debug!("No local handler to stop"),
        }
        if let Some(player) = &self.player {
            player.close();
        }
        self.send_event(BridgeEvent::Stopped);
    }

    fn claim_input(&mut self, kind: InputKind) -> BridgeResult<()> {
        if self.input.is_set() {
            warn!(
                current = self.input.name(),
                requested = kind.name(),
                "Input already configured"
            );
            return Err(BridgeError::AlreadyConfigured(self.input.name()));
        }
        self.input = kind;
        Ok(())
    }

    fn require_input(&self) -> BridgeResult<()> {
        if self.input.is_set() {
            Ok(())
        } else {
            Err(BridgeError::Wiring(
                "no input source to wire the output to".to_string(),
            ))
        }
    }

    fn wire_output(&self, sink: Arc<dyn ByteSink>) -> BridgeResult<()> {
        self.require_input()?;
        if !self.byte_writer.append_writer(sink) {
            debug!("Output already wired");
        }
        Ok(())
    }

    fn ensure_player(&mut self) -> Arc<Player> {
        let player = self.player.get_or_insert_with(|| {
            Arc::new(Player::with_options(
                Arc::clone(&self.int_writer),
                Arc::clone(&self.byte_writer),
                self.events.clone(),
                self.config.zero_copy_samples,
            ))
        });
        Arc::clone(player)
    }

    fn send_event(&self, event: BridgeEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.try_send(event) {
                warn!("Failed to send event: {}", e);
            }
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Some(player) = &self.player {
            player.close();
        }
    }
}
