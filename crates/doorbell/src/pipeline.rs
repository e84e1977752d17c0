//! Playback pipeline: converter → pipe → player.
//!
//! The converter (ffmpeg by default) decodes any input format into raw
//! signed 16-bit little-endian PCM at 44.1kHz stereo on its stdout. That
//! stdout becomes the player's stdin (aplay by default, in CD framing), so
//! no audio bytes pass through this process. Both children share our stderr.

use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use doorbellconf::PipelineConfig;
use tokio::process::Command;
use tracing::debug;

use crate::error::{DoorbellError, PipelineStep, Result};

/// Output sample rate requested from the converter.
pub const SAMPLE_RATE: u32 = 44_100;

/// aplay's `cd` format: S16_LE, 44100Hz, stereo.
const PLAYER_ARGS: [&str; 2] = ["-f", "cd"];

/// Plays one file to completion.
#[async_trait]
pub trait Player: Send + Sync {
    /// Blocks (asynchronously) until the file has finished playing.
    async fn play(&self, path: &Path) -> Result<()>;
}

/// Plays through two external processes joined by a pipe.
#[derive(Debug, Clone)]
pub struct ExternalPlayer {
    converter: String,
    player: String,
    normalize_filter: Option<String>,
}

impl ExternalPlayer {
    pub fn new(converter: impl Into<String>, player: impl Into<String>) -> Self {
        Self {
            converter: converter.into(),
            player: player.into(),
            normalize_filter: None,
        }
    }

    /// Apply an audio filter in the converter (loudness normalization).
    pub fn with_normalize_filter(mut self, filter: Option<String>) -> Self {
        self.normalize_filter = filter;
        self
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let filter = config
            .normalize
            .then(|| config.normalize_filter.clone())
            .filter(|f| !f.trim().is_empty());
        Self::new(&config.converter, &config.player).with_normalize_filter(filter)
    }

    /// Arguments for the converter reading `path`.
    pub fn converter_args(&self, path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(path.as_os_str().to_owned());
        args.extend(["-f", "s16le", "-c:a", "pcm_s16le"].iter().map(OsString::from));
        if let Some(filter) = &self.normalize_filter {
            args.push("-af".into());
            args.push(filter.into());
        }
        args.push("-ac".into());
        args.push("2".into());
        args.push("-ar".into());
        args.push(SAMPLE_RATE.to_string().into());
        args.push("-".into());
        args
    }

    pub fn player_args(&self) -> &'static [&'static str] {
        &PLAYER_ARGS
    }
}

#[async_trait]
impl Player for ExternalPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        debug!(
            "spawning {} {:?} | {} {:?}",
            self.converter,
            self.converter_args(path),
            self.player,
            PLAYER_ARGS
        );

        let mut converter = Command::new(&self.converter)
            .args(self.converter_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(PipelineStep::Convert, &self.converter, e))?;

        let pcm: Stdio = converter
            .stdout
            .take()
            .ok_or_else(|| DoorbellError::ProcessError {
                step: PipelineStep::Convert,
                message: "converter stdout was not captured".to_string(),
            })?
            .try_into()
            .map_err(|e: std::io::Error| DoorbellError::ProcessError {
                step: PipelineStep::Convert,
                message: format!("failed to hand converter output to player: {}", e),
            })?;

        let mut player = match Command::new(&self.player)
            .args(PLAYER_ARGS)
            .stdin(pcm)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                // Nobody will read the pipe; don't leave the converter writing into it
                let _ = converter.kill().await;
                return Err(spawn_error(PipelineStep::Play, &self.player, e));
            }
        };

        let converted = converter.wait().await;
        let played = player.wait().await;

        // A player that exits early closes the pipe and the converter then
        // fails writing to it, so the player's status is checked first
        check_exit(PipelineStep::Play, &self.player, played)?;
        check_exit(PipelineStep::Convert, &self.converter, converted)?;
        Ok(())
    }
}

fn spawn_error(step: PipelineStep, program: &str, e: std::io::Error) -> DoorbellError {
    DoorbellError::ProcessError {
        step,
        message: format!("failed to start '{}': {}", program, e),
    }
}

fn check_exit(
    step: PipelineStep,
    program: &str,
    status: std::io::Result<ExitStatus>,
) -> Result<()> {
    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(DoorbellError::ProcessError {
            step,
            message: format!("'{}' exited with {}", program, status),
        }),
        Err(e) => Err(DoorbellError::ProcessError {
            step,
            message: format!("failed waiting for '{}': {}", program, e),
        }),
    }
}
