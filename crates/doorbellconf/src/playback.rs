//! Playback configuration - what to play, when, and with which programs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ConfigError;

/// How incoming messages decide whether to ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Every message on the topic is a press.
    Press,
    /// Only the configured activate payload rings; anything else is a status poll.
    #[default]
    State,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Press => write!(f, "press"),
            TriggerKind::State => write!(f, "state"),
        }
    }
}

impl FromStr for TriggerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "press" => Ok(TriggerKind::Press),
            "state" => Ok(TriggerKind::State),
            other => Err(ConfigError::Invalid(format!(
                "unknown trigger '{}' (expected 'press' or 'state')",
                other
            ))),
        }
    }
}

/// Sound source and triggering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundConfig {
    /// A sound file, or a directory to pick from at random.
    /// Default: empty (every activation logs an error until set)
    #[serde(default)]
    pub path: PathBuf,

    /// Triggering mode.
    /// Default: state
    #[serde(default)]
    pub trigger: TriggerKind,

    /// Payload that means "ring" in state mode.
    /// Default: ON
    #[serde(default = "SoundConfig::default_activate_payload")]
    pub activate_payload: String,

    /// Capacity of the hand-off queue between the bus and the controller.
    /// Default: 16
    #[serde(default = "SoundConfig::default_queue_capacity")]
    pub queue_capacity: usize,
}

impl SoundConfig {
    fn default_activate_payload() -> String {
        "ON".to_string()
    }

    fn default_queue_capacity() -> usize {
        16
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            trigger: TriggerKind::default(),
            activate_payload: Self::default_activate_payload(),
            queue_capacity: Self::default_queue_capacity(),
        }
    }
}

/// External programs used for conversion and output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Converter emitting raw s16le PCM on stdout.
    /// Default: ffmpeg
    #[serde(default = "PipelineConfig::default_converter")]
    pub converter: String,

    /// Player reading CD-framed PCM from stdin.
    /// Default: aplay
    #[serde(default = "PipelineConfig::default_player")]
    pub player: String,

    /// Apply the loudness normalization filter.
    /// Default: true
    #[serde(default = "PipelineConfig::default_normalize")]
    pub normalize: bool,

    /// Converter audio filter used when `normalize` is set.
    /// Default: dynaudnorm=f=100:g=15:n=1:p=1
    #[serde(default = "PipelineConfig::default_normalize_filter")]
    pub normalize_filter: String,
}

impl PipelineConfig {
    fn default_converter() -> String {
        "ffmpeg".to_string()
    }

    fn default_player() -> String {
        "aplay".to_string()
    }

    fn default_normalize() -> bool {
        true
    }

    fn default_normalize_filter() -> String {
        "dynaudnorm=f=100:g=15:n=1:p=1".to_string()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            converter: Self::default_converter(),
            player: Self::default_player(),
            normalize: Self::default_normalize(),
            normalize_filter: Self::default_normalize_filter(),
        }
    }
}
