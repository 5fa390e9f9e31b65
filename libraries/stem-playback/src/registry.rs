//! Track registry
//!
//! Read-side bookkeeping for the stems of the current session: which stems
//! exist, in which order, and what to show for each.

use crate::error::{PlaybackError, Result};
use crate::types::{TrackId, TrackSet};
use serde::Serialize;

/// Static per-stem metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackMetadata {
    pub label: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub locator: String,
}

/// Stems registered for one session
#[derive(Debug, Default)]
pub struct TrackRegistry {
    entries: Vec<(TrackId, TrackMetadata)>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every stem in `track_set`, replacing any previous contents
    ///
    /// Returns the stems in registration order.
    pub fn register(&mut self, track_set: &TrackSet) -> Result<Vec<TrackId>> {
        if track_set.is_empty() {
            return Err(PlaybackError::EmptyTrackSet);
        }

        self.entries = track_set
            .iter()
            .map(|(id, locator)| {
                (
                    id,
                    TrackMetadata {
                        label: id.label(),
                        color: id.color(),
                        icon: id.icon(),
                        locator: locator.to_string(),
                    },
                )
            })
            .collect();

        Ok(self.ids())
    }

    pub fn metadata(&self, id: TrackId) -> Result<&TrackMetadata> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, metadata)| metadata)
            .ok_or(PlaybackError::NotFound(id))
    }

    pub fn locator(&self, id: TrackId) -> Result<&str> {
        self.metadata(id).map(|metadata| metadata.locator.as_str())
    }

    /// Registered stems in registration order
    pub fn ids(&self) -> Vec<TrackId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.entries.iter().any(|(existing, _)| *existing == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
