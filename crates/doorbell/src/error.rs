//! Error kinds shared by the selector, pipeline, controller and bus.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which external process in the playback pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    /// Format conversion to raw PCM (ffmpeg)
    Convert,
    /// Audio output (aplay)
    Play,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStep::Convert => write!(f, "convert"),
            PipelineStep::Play => write!(f, "play"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DoorbellError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("sound path '{}' does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("no playable files in '{}'", .0.display())]
    NoCandidates(PathBuf),

    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} step failed: {message}")]
    ProcessError { step: PipelineStep, message: String },

    #[error("broker connection failed: {0}")]
    ConnectionError(String),
}

impl DoorbellError {
    /// Only a failed broker connection stops the daemon; everything else is
    /// scoped to a single activation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DoorbellError::ConnectionError(_))
    }
}

pub type Result<T> = std::result::Result<T, DoorbellError>;
