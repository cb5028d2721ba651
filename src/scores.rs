//! Best-run records with fixed-layout binary persistence
//!
//! The score file is a 16-byte little-endian record written field by field.
//! Persistence is best-effort: a missing, truncated or unreadable file
//! falls back to defaults, and a failed save is logged and ignored. The
//! sim itself never touches the filesystem; the shell calls [`load`] and
//! [`save`] around [`crate::sim::GameEvent::ScoresChanged`] events.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::consts::STARTING_HEIGHT;

/// Encoded size of a score record
pub const ENCODED_LEN: usize = 16;

/// All-time best records across runs
///
/// `fastest_time` and `fewest_hits` use `-1` as the "no win yet" sentinel;
/// `lowest` is the lowest altitude ever reached and starts at the top of
/// the mountain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub fastest_time: f64,
    pub lowest: f32,
    pub fewest_hits: i16,
    pub wins: i16,
}

impl Default for Scores {
    fn default() -> Self {
        Self {
            fastest_time: -1.0,
            lowest: STARTING_HEIGHT,
            fewest_hits: -1,
            wins: 0,
        }
    }
}

impl Scores {
    /// Little-endian field-by-field layout: f64, f32, i16, i16
    pub fn encode(&self) -> [u8; ENCODED_LEN] {
        let mut buf = [0u8; ENCODED_LEN];
        buf[0..8].copy_from_slice(&self.fastest_time.to_le_bytes());
        buf[8..12].copy_from_slice(&self.lowest.to_le_bytes());
        buf[12..14].copy_from_slice(&self.fewest_hits.to_le_bytes());
        buf[14..16].copy_from_slice(&self.wins.to_le_bytes());
        buf
    }

    /// Decode the first [`ENCODED_LEN`] bytes of a record; `None` if there
    /// are fewer. Trailing bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..ENCODED_LEN)?;
        Some(Self {
            fastest_time: f64::from_le_bytes(bytes[0..8].try_into().ok()?),
            lowest: f32::from_le_bytes(bytes[8..12].try_into().ok()?),
            fewest_hits: i16::from_le_bytes(bytes[12..14].try_into().ok()?),
            wins: i16::from_le_bytes(bytes[14..16].try_into().ok()?),
        })
    }
}

/// Read the score file, falling back to defaults on any failure
pub fn load(path: &Path) -> Scores {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            info!("no score file at {}: {err}", path.display());
            return Scores::default();
        }
    };
    match Scores::decode(&bytes) {
        Some(scores) => scores,
        None => {
            warn!(
                "score file {} has {} bytes, need {ENCODED_LEN}; using defaults",
                path.display(),
                bytes.len()
            );
            Scores::default()
        }
    }
}

/// Write the score file; failure is logged, never fatal
pub fn save(path: &Path, scores: &Scores) {
    if let Err(err) = fs::write(path, scores.encode()) {
        warn!("failed to save scores to {}: {err}", path.display());
    }
}
