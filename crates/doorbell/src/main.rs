//! sound-mqtt-doorbell - play a random sound when the doorbell topic fires
//!
//! Subscribes to one MQTT topic and, on each activation, plays a file picked
//! at random (without repeats) from `--sound-path` through ffmpeg and aplay.
//! Presses that arrive while a sound is playing are dropped.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use doorbell::{telemetry, Bus, EventController, ExternalPlayer, TriggerMode};
use doorbellconf::{DoorbellConfig, TriggerKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "sound-mqtt-doorbell")]
#[command(about = "Play a random doorbell sound when an MQTT topic fires")]
#[command(version)]
struct Cli {
    /// URI of the MQTT broker, credentials inline [default: mqtt://127.0.0.1:1883]
    #[arg(long = "broker-uri", alias = "brokerURI")]
    broker_uri: Option<String>,

    /// Client ID for MQTT [default: sound-mqtt-doorbell]
    #[arg(long = "client-id", alias = "clientID")]
    client_id: Option<String>,

    /// MQTT topic to subscribe to [default: sound-mqtt-doorbell]
    #[arg(long)]
    topic: Option<String>,

    /// A sound file, or a folder to pick a random file from
    #[arg(long = "sound-path", alias = "soundPath")]
    sound_path: Option<PathBuf>,

    /// `press`: every message rings. `state`: only the activate payload rings [default: state]
    #[arg(long)]
    trigger: Option<TriggerKind>,

    /// Payload that rings in state mode [default: ON]
    #[arg(long = "activate-payload")]
    activate_payload: Option<String>,

    /// Config file, used instead of ./doorbell.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    /// Flags win over files and environment.
    fn apply(&self, config: &mut DoorbellConfig) {
        if let Some(v) = &self.broker_uri {
            config.broker.uri = v.clone();
        }
        if let Some(v) = &self.client_id {
            config.broker.client_id = v.clone();
        }
        if let Some(v) = &self.topic {
            config.broker.topic = v.clone();
        }
        if let Some(v) = &self.sound_path {
            config.sound.path = v.clone();
        }
        if let Some(v) = self.trigger {
            config.sound.trigger = v;
        }
        if let Some(v) = &self.activate_payload {
            config.sound.activate_payload = v.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let (mut config, sources) = DoorbellConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    if cli.print_config {
        print!("{}", config.to_toml());
        return Ok(ExitCode::SUCCESS);
    }

    telemetry::init(&config.telemetry.log_level)?;

    info!("sound-mqtt-doorbell {} starting", env!("CARGO_PKG_VERSION"));
    for file in &sources.files {
        info!("   config: {}", file.display());
    }
    if !sources.env_overrides.is_empty() {
        info!("   env: {}", sources.env_overrides.join(", "));
    }

    let bus = Bus::connect(&config.broker)
        .await
        .context("Failed to connect to MQTT broker")?;
    bus.subscribe().await?;

    let cancel = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::channel(config.sound.queue_capacity);

    let controller = EventController::new(
        config.sound.path.clone(),
        TriggerMode::from_config(&config.sound),
        ExternalPlayer::from_config(&config.pipeline),
    );
    let controller_task = tokio::spawn(controller.run(events_rx, cancel.clone()));
    let bus_task = tokio::spawn(bus.run(events_tx, cancel.clone()));

    info!("🔔 listening on '{}'", config.broker.topic);

    shutdown_signal().await;

    info!("cleanup");
    cancel.cancel();
    if let Err(e) = bus_task.await {
        warn!("bus task ended abnormally: {}", e);
    }
    match controller_task.await {
        Ok(stats) => info!(
            "rang {} times ({} dropped while playing, {} ignored, {} failed)",
            stats.admitted,
            stats.dropped,
            stats.ignored,
            stats.selection_failures + stats.playback_failures
        ),
        Err(e) => warn!("controller task ended abnormally: {}", e),
    }

    // Terminated by signal
    Ok(ExitCode::FAILURE)
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_accepts_legacy_flag_names() {
        let cli = Cli::try_parse_from([
            "sound-mqtt-doorbell",
            "--brokerURI",
            "mqtt://u:p@broker:1883",
            "--clientID",
            "porch",
            "--topic",
            "home/porch",
            "--soundPath",
            "/srv/chimes",
        ])
        .unwrap();

        let mut config = DoorbellConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.broker.uri, "mqtt://u:p@broker:1883");
        assert_eq!(config.broker.client_id, "porch");
        assert_eq!(config.broker.topic, "home/porch");
        assert_eq!(config.sound.path, PathBuf::from("/srv/chimes"));
    }

    #[test]
    fn test_cli_trigger_and_payload() {
        let cli = Cli::try_parse_from([
            "sound-mqtt-doorbell",
            "--trigger",
            "press",
            "--activate-payload",
            "pressed",
        ])
        .unwrap();

        let mut config = DoorbellConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.sound.trigger, TriggerKind::Press);
        assert_eq!(config.sound.activate_payload, "pressed");
    }

    #[test]
    fn test_cli_leaves_config_alone_without_flags() {
        let cli = Cli::try_parse_from(["sound-mqtt-doorbell"]).unwrap();
        let mut config = DoorbellConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, DoorbellConfig::default());
    }

    #[test]
    fn test_cli_rejects_positional_arguments() {
        assert!(Cli::try_parse_from(["sound-mqtt-doorbell", "/srv/chimes"]).is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_trigger() {
        assert!(Cli::try_parse_from(["sound-mqtt-doorbell", "--trigger", "toggle"]).is_err());
    }
}
