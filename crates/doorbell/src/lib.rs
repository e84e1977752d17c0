//! sound-mqtt-doorbell - plays a random chime when an MQTT topic says so.
//!
//! - `selector`: non-repeating random pick from a file or directory
//! - `pipeline`: converter → pipe → player, via external processes
//! - `controller`: Idle/Playing state machine over activation events
//! - `bus`: MQTT connection and subscription (rumqttc)
//! - `telemetry`: tracing subscriber setup

pub mod bus;
pub mod controller;
pub mod error;
pub mod pipeline;
pub mod selector;
pub mod telemetry;

pub use bus::{parse_broker_uri, Bus, BrokerTarget};
pub use controller::{
    ActivationEvent, ControllerStats, EventController, PlaybackState, TriggerMode,
};
pub use error::{DoorbellError, PipelineStep};
pub use pipeline::{ExternalPlayer, Player};
pub use selector::SoundSelector;
