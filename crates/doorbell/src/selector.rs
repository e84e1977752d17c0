//! Non-repeating random sound selection.
//!
//! A source is either a single file (always returned) or a directory whose
//! visible files form the candidate pool. Picks from a directory never repeat
//! within a round; once every candidate has played, the history is cleared
//! and a new round starts.
//!
//! The directory is listed again on every pick, so files can be added or
//! removed while the daemon runs.

use std::collections::HashSet;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{DoorbellError, Result};

/// Names starting with this are never candidates.
const HIDDEN_PREFIX: char = '.';

/// Picks sound files without repeating until the pool is exhausted.
pub struct SoundSelector<R = StdRng> {
    played: HashSet<PathBuf>,
    rng: R,
}

impl SoundSelector<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for SoundSelector<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> SoundSelector<R> {
    /// Build a selector over a caller-supplied random source.
    pub fn with_rng(rng: R) -> Self {
        Self {
            played: HashSet::new(),
            rng,
        }
    }

    /// Paths picked in the current round.
    pub fn played(&self) -> &HashSet<PathBuf> {
        &self.played
    }

    /// Pick the next sound from `source`.
    pub fn pick(&mut self, source: &Path) -> Result<PathBuf> {
        if source.as_os_str().is_empty() {
            return Err(DoorbellError::InvalidInput(
                "sound file/folder path is empty".to_string(),
            ));
        }

        let metadata = std::fs::metadata(source).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DoorbellError::NotFound(source.to_path_buf()),
            _ => DoorbellError::Io {
                path: source.to_path_buf(),
                source: e,
            },
        })?;

        if !metadata.is_dir() {
            return Ok(source.to_path_buf());
        }

        let pool = list_candidates(source)?;
        if pool.is_empty() {
            return Err(DoorbellError::NoCandidates(source.to_path_buf()));
        }

        if self.played.len() >= pool.len() {
            debug!(
                "played {} of {} candidates, starting a new round",
                self.played.len(),
                pool.len()
            );
            self.played.clear();
        }

        // History is smaller than the pool here, so at least one is unvisited
        let unvisited: Vec<PathBuf> = pool
            .iter()
            .map(|name| source.join(name))
            .filter(|path| !self.played.contains(path))
            .collect();

        let chosen = unvisited
            .choose(&mut self.rng)
            .cloned()
            .ok_or_else(|| DoorbellError::NoCandidates(source.to_path_buf()))?;

        self.played.insert(chosen.clone());
        Ok(chosen)
    }
}

/// Visible, non-directory entries of `dir`, sorted by name.
fn list_candidates(dir: &Path) -> Result<Vec<OsString>> {
    let io_err = |source: std::io::Error| DoorbellError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(HIDDEN_PREFIX) {
            continue;
        }
        // is_dir follows symlinks, so a link to a file stays a candidate
        if entry.path().is_dir() {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
