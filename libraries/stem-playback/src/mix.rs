//! Per-stem mix control
//!
//! Each stem carries a linear volume (0.0-1.0) and a mute flag. Muting keeps
//! the stored volume so unmuting restores it.

use crate::error::{PlaybackError, Result};
use crate::types::TrackId;
use serde::{Deserialize, Serialize};

/// Volume and mute state for one stem
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixEntry {
    /// Stored volume (0.0-1.0)
    pub volume: f32,

    /// Mute state (preserves volume)
    pub muted: bool,
}

impl MixEntry {
    /// Volume actually applied to the stem
    ///
    /// Returns 0.0 if muted, otherwise the stored volume
    pub fn effective(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

impl Default for MixEntry {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
        }
    }
}

/// Receiver of effective volumes
///
/// Implemented by the transport, which forwards to the stem's binding.
pub trait VolumeTarget {
    fn apply_volume(&mut self, track: TrackId, effective: f32);
}

/// Mix settings for every stem of a session
#[derive(Debug, Clone, Default)]
pub struct MixState {
    entries: Vec<(TrackId, MixEntry)>,
}

impl MixState {
    /// Default entries (full volume, unmuted) for `tracks`
    pub fn new(tracks: &[TrackId]) -> Self {
        Self {
            entries: tracks
                .iter()
                .map(|track| (*track, MixEntry::default()))
                .collect(),
        }
    }

    pub fn entry(&self, track: TrackId) -> Result<MixEntry> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == track)
            .map(|(_, entry)| *entry)
            .ok_or(PlaybackError::NotFound(track))
    }

    /// All entries in registration order
    pub fn entries(&self) -> &[(TrackId, MixEntry)] {
        &self.entries
    }

    pub fn effective_volume(&self, track: TrackId) -> Result<f32> {
        self.entry(track).map(|entry| entry.effective())
    }

    /// Store `volume` (clamped to 0.0-1.0) and push it unless muted
    pub fn set_volume(
        &mut self,
        track: TrackId,
        volume: f32,
        target: &mut impl VolumeTarget,
    ) -> Result<MixEntry> {
        let entry = self.entry_mut(track)?;
        entry.volume = clamp_volume(volume);
        let entry = *entry;

        if !entry.muted {
            target.apply_volume(track, entry.effective());
        }
        Ok(entry)
    }

    /// Flip the mute flag and push the resulting effective volume
    pub fn toggle_mute(&mut self, track: TrackId, target: &mut impl VolumeTarget) -> Result<MixEntry> {
        let entry = self.entry_mut(track)?;
        entry.muted = !entry.muted;
        let entry = *entry;

        target.apply_volume(track, entry.effective());
        Ok(entry)
    }

    /// Push every stem's effective volume
    pub fn apply_all(&self, target: &mut impl VolumeTarget) {
        for (track, entry) in &self.entries {
            target.apply_volume(*track, entry.effective());
        }
    }

    fn entry_mut(&mut self, track: TrackId) -> Result<&mut MixEntry> {
        self.entries
            .iter_mut()
            .find(|(existing, _)| *existing == track)
            .map(|(_, entry)| entry)
            .ok_or(PlaybackError::NotFound(track))
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
