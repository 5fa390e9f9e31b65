//! Error types for stem playback

use crate::types::TrackId;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Track is not registered in the current session
    #[error("Track not found: {0}")]
    NotFound(TrackId),

    /// A session needs at least one track
    #[error("Track set is empty")]
    EmptyTrackSet,

    /// Track name is not one of the known stems
    #[error("Unknown track: {0}")]
    UnknownTrack(String),

    /// A track's media resource failed to prepare
    #[error("Failed to load {track}: {message}")]
    MediaLoad { track: TrackId, message: String },

    /// The host media subsystem refused a command
    #[error("{command} rejected for {track}: {message}")]
    CommandRejected {
        track: TrackId,
        command: &'static str,
        message: String,
    },

    /// Best-effort session cleanup could not be delivered
    #[error("Session cleanup failed: {0}")]
    CleanupFailed(String),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Errors reported by a host media element
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The resource is not ready for this command yet
    #[error("media not ready")]
    NotReady,

    /// The host cannot handle this resource or command
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Any other host failure
    #[error("{0}")]
    Failed(String),
}

/// Result type for host media operations
pub type HostResult<T> = std::result::Result<T, HostError>;
