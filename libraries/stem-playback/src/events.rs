//! Playback Events
//!
//! Event-based communication for UI synchronization. Events are queued on the
//! command path and drained by the caller:
//! - Session start/end
//! - Transport state changes (loading, ready, playing, paused, disposed)
//! - Duration and position updates
//! - Per-stem volume/mute changes and stem failures

use crate::types::{TrackId, TransportState};
use serde::{Deserialize, Serialize};

/// Events emitted by the playback system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// A new track set was loaded
    SessionStarted {
        /// Stems in registration order
        tracks: Vec<TrackId>,
    },

    /// Transport state changed
    StateChanged {
        /// The new state
        state: TransportState,
    },

    /// Unified duration became known or changed
    DurationChanged {
        /// Duration in seconds
        duration: f64,
    },

    /// Position update (every host time update and every seek)
    PositionUpdate {
        /// Current position in seconds
        current_time: f64,
        /// Duration in seconds, if known
        duration: Option<f64>,
    },

    /// A stem's mix settings changed
    VolumeChanged {
        track: TrackId,
        /// Stored volume (0.0-1.0)
        volume: f32,
        muted: bool,
        /// Volume actually applied
        effective: f32,
    },

    /// A stem failed; the rest keep playing
    TrackFailed { track: TrackId, message: String },

    /// Session torn down
    SessionEnded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_lowercase_track_names() {
        let event = PlaybackEvent::VolumeChanged {
            track: TrackId::Vocals,
            volume: 0.5,
            muted: true,
            effective: 0.0,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"vocals\""));
        assert!(json.contains("VolumeChanged"));

        let back: PlaybackEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
