//! Event controller - the Idle/Playing state machine.
//!
//! Events arrive one at a time on an mpsc channel. An admissible event seen
//! while `Idle` selects a sound and plays it; anything that arrives while
//! `Playing` is dropped, never queued for later. Playback always returns the
//! controller to `Idle`, whether it succeeded or not.

use std::path::PathBuf;

use bytes::Bytes;
use doorbellconf::{SoundConfig, TriggerKind};
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::pipeline::Player;
use crate::selector::SoundSelector;

/// A message received on the subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationEvent {
    pub topic: String,
    pub payload: Bytes,
}

impl ActivationEvent {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as text, for logging and state comparison.
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Which events start playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerMode {
    /// Every event is a doorbell press.
    Press,
    /// The sensor reports its state; only `activate_payload` rings.
    State { activate_payload: String },
}

impl TriggerMode {
    pub fn from_config(config: &SoundConfig) -> Self {
        match config.trigger {
            TriggerKind::Press => TriggerMode::Press,
            TriggerKind::State => TriggerMode::State {
                activate_payload: config.activate_payload.clone(),
            },
        }
    }

    pub fn admits(&self, event: &ActivationEvent) -> bool {
        match self {
            TriggerMode::Press => true,
            TriggerMode::State { activate_payload } => {
                event.payload_str().trim() == activate_payload.as_str()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

/// Counters reported when the controller stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Events that started a playback attempt
    pub admitted: u64,
    /// Events discarded because a sound was already playing
    pub dropped: u64,
    /// Events that did not match the trigger mode
    pub ignored: u64,
    /// Activations where no file could be selected
    pub selection_failures: u64,
    /// Activations where the pipeline reported an error
    pub playback_failures: u64,
}

/// Drives selection and playback from a stream of activation events.
pub struct EventController<P, R = rand::rngs::StdRng> {
    source: PathBuf,
    trigger: TriggerMode,
    selector: SoundSelector<R>,
    player: P,
    state: PlaybackState,
    stats: ControllerStats,
}

impl<P: Player> EventController<P> {
    pub fn new(source: impl Into<PathBuf>, trigger: TriggerMode, player: P) -> Self {
        Self::with_selector(source, trigger, player, SoundSelector::new())
    }
}

impl<P: Player, R: Rng + Send> EventController<P, R> {
    pub fn with_selector(
        source: impl Into<PathBuf>,
        trigger: TriggerMode,
        player: P,
        selector: SoundSelector<R>,
    ) -> Self {
        Self {
            source: source.into(),
            trigger,
            selector,
            player,
            state: PlaybackState::Idle,
            stats: ControllerStats::default(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    /// Consume events until the channel closes or `cancel` fires.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ActivationEvent>,
        cancel: CancellationToken,
    ) -> ControllerStats {
        info!(
            "controller ready: source '{}', trigger {:?}",
            self.source.display(),
            self.trigger
        );

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if !self.trigger.admits(&event) {
                self.stats.ignored += 1;
                debug!("[{}]: '{}' is not an activation", event.topic, event.payload_str());
                continue;
            }

            if !self.activate(&mut events, &cancel).await {
                break;
            }
        }

        info!("controller stopped: {:?}", self.stats);
        self.stats
    }

    /// Handle one admitted event. Returns false if the controller should stop.
    async fn activate(
        &mut self,
        events: &mut mpsc::Receiver<ActivationEvent>,
        cancel: &CancellationToken,
    ) -> bool {
        self.stats.admitted += 1;
        self.state = PlaybackState::Playing;

        let sound = match self.selector.pick(&self.source) {
            Ok(sound) => sound,
            Err(e) => {
                self.stats.selection_failures += 1;
                error!("{}", e);
                self.state = PlaybackState::Idle;
                return true;
            }
        };

        info!("Playing sound file '{}'", sound.display());

        let mut keep_running = true;
        let mut dropped = 0u64;
        let result = {
            let playback = self.player.play(&sound);
            tokio::pin!(playback);

            loop {
                tokio::select! {
                    result = &mut playback => break Some(result),
                    _ = cancel.cancelled() => {
                        keep_running = false;
                        break None;
                    }
                    event = events.recv(), if keep_running => match event {
                        Some(event) => {
                            dropped += 1;
                            debug!("[{}]: busy playing, dropped '{}'", event.topic, event.payload_str());
                        }
                        // Sender gone: finish this sound, then stop
                        None => keep_running = false,
                    },
                }
            }
        };

        // Anything still queued arrived while the sound was playing
        while let Ok(event) = events.try_recv() {
            dropped += 1;
            debug!("[{}]: busy playing, dropped '{}'", event.topic, event.payload_str());
        }
        self.stats.dropped += dropped;

        match result {
            Some(Ok(())) => debug!("finished '{}'", sound.display()),
            Some(Err(e)) => {
                self.stats.playback_failures += 1;
                error!("playback of '{}' failed: {}", sound.display(), e);
            }
            None => info!("cancelled during playback of '{}'", sound.display()),
        }

        self.state = PlaybackState::Idle;
        keep_running
    }
}
