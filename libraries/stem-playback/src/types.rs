//! Core types for stem playback

use crate::error::PlaybackError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stem identifier agreed with the separation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackId {
    Vocals,
    Drums,
    Bass,
    Other,
}

impl TrackId {
    /// Every stem the separation service can return, in display order
    pub const ALL: [TrackId; 4] = [
        TrackId::Vocals,
        TrackId::Drums,
        TrackId::Bass,
        TrackId::Other,
    ];

    /// Wire name (`vocals`, `drums`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackId::Vocals => "vocals",
            TrackId::Drums => "drums",
            TrackId::Bass => "bass",
            TrackId::Other => "other",
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            TrackId::Vocals => "Vocals",
            TrackId::Drums => "Drums",
            TrackId::Bass => "Bass",
            TrackId::Other => "Other",
        }
    }

    /// Accent color as a hex string
    pub fn color(&self) -> &'static str {
        match self {
            TrackId::Vocals => "#e74c3c",
            TrackId::Drums => "#f39c12",
            TrackId::Bass => "#9b59b6",
            TrackId::Other => "#2ecc71",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            TrackId::Vocals => "🎤",
            TrackId::Drums => "🥁",
            TrackId::Bass => "🎸",
            TrackId::Other => "🎹",
        }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackId {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        TrackId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| PlaybackError::UnknownTrack(name.to_string()))
    }
}

/// Opaque token identifying a server-side separation session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mapping from stem to playable resource locator
///
/// Insertion order is kept and used for display and command fan-out.
/// Inserting an existing stem replaces its locator in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSet {
    tracks: Vec<(TrackId, String)>,
    session_token: Option<SessionToken>,
}

impl TrackSet {
    /// Create an empty track set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a track locator
    pub fn with_track(mut self, id: TrackId, locator: impl Into<String>) -> Self {
        self.insert(id, locator);
        self
    }

    /// Attach the server session token used for cleanup
    pub fn with_session_token(mut self, token: SessionToken) -> Self {
        self.session_token = Some(token);
        self
    }

    fn insert(&mut self, id: TrackId, locator: impl Into<String>) {
        let locator = locator.into();
        match self.tracks.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = locator,
            None => self.tracks.push((id, locator)),
        }
    }

    pub fn session_token(&self) -> Option<&SessionToken> {
        self.session_token.as_ref()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn locator(&self, id: TrackId) -> Option<&str> {
        self.tracks
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, locator)| locator.as_str())
    }

    /// Iterate over `(track, locator)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &str)> {
        self.tracks.iter().map(|(id, locator)| (*id, locator.as_str()))
    }
}

impl FromIterator<(TrackId, String)> for TrackSet {
    fn from_iter<I: IntoIterator<Item = (TrackId, String)>>(iter: I) -> Self {
        let mut set = TrackSet::new();
        for (id, locator) in iter {
            set.insert(id, locator);
        }
        set
    }
}

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    /// No track set loaded
    Idle,

    /// Waiting for the first stem to report its duration
    Loading,

    /// Duration known, not started yet
    Ready,

    /// All stems commanded to play
    Playing,

    /// All stems commanded to pause
    Paused,

    /// Torn down; commands are ignored
    Disposed,
}

/// Unified transport values for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportSnapshot {
    pub state: TransportState,
    pub is_playing: bool,
    /// Seconds
    pub current_time: f64,
    /// Seconds, once any stem reported it
    pub duration: Option<f64>,
}

impl TransportSnapshot {
    /// Position as a fraction of the duration (0 while unknown)
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(duration) if duration > 0.0 => (self.current_time / duration).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

/// How the transport picks a duration when stems report different lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationPolicy {
    /// Keep the first duration any stem reports
    #[default]
    FirstReported,

    /// Keep the shortest duration reported so far
    Shortest,
}

/// Configuration for a playback session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Notify cleanup for the old session when `start` replaces it (default: true)
    pub cleanup_on_replace: bool,

    /// Duration reconciliation across stems (default: FirstReported)
    pub duration_policy: DurationPolicy,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            cleanup_on_replace: true,
            duration_policy: DurationPolicy::FirstReported,
        }
    }
}

/// Format seconds as `m:ss` for display
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
