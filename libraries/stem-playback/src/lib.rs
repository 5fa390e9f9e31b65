//! Stem Player - Stem Playback
//!
//! Synchronized playback of the separated stems of one song (vocals, drums,
//! bass, other) as a single unit, with per-stem volume and mute.
//!
//! This crate provides:
//! - Track registry (stem id to locator, display metadata)
//! - Media bindings wrapping one host media element per stem
//! - Unified transport (play/pause toggle, seek, seek by fraction)
//! - Per-stem mix (volume 0.0-1.0, mute preserving volume)
//! - Session lifecycle with best-effort server cleanup
//! - Event queue for UI synchronization
//!
//! # Architecture
//!
//! `stem-playback` does no decoding or output itself:
//! - No dependency on CPAL (desktop audio)
//! - No dependency on an HTTP client
//! - Host media is reached through the [`MediaHost`] / [`MediaElement`] traits
//!
//! Host notifications travel over a per-session channel and are applied on
//! the caller's thread by [`SessionLifecycle::pump`].
//!
//! # Example
//!
//! ```rust
//! use stem_playback::memory::MemoryHost;
//! use stem_playback::{PlaybackConfig, SessionLifecycle, TrackId, TrackSet, TransportState};
//!
//! let host = MemoryHost::new();
//! let mut session = SessionLifecycle::new(host.clone(), PlaybackConfig::default());
//!
//! session
//!     .start(
//!         TrackSet::new()
//!             .with_track(TrackId::Vocals, "vocals.wav")
//!             .with_track(TrackId::Drums, "drums.wav"),
//!     )
//!     .unwrap();
//!
//! // The host reports a duration for one stem
//! host.element(TrackId::Drums).unwrap().report_duration(180.0);
//! session.pump();
//! assert_eq!(session.state(), TransportState::Ready);
//!
//! session.toggle_play_pause();
//! session.seek(200.0); // clamped to 180.0
//! session.toggle_mute(TrackId::Vocals).unwrap();
//! session.end();
//! ```

mod binding;
mod error;
mod events;
mod host;
pub mod memory;
mod mix;
mod registry;
mod session;
mod transport;
pub mod types;

// Public exports
pub use binding::{BindingNotification, MediaBinding};
pub use error::{HostError, HostResult, PlaybackError, Result};
pub use events::PlaybackEvent;
pub use host::{HostEvent, HostEventKind, HostNotifier, MediaElement, MediaHost, Subscription, SubscriptionId};
pub use mix::{MixEntry, MixState, VolumeTarget};
pub use registry::{TrackMetadata, TrackRegistry};
pub use session::{SessionCleanup, SessionLifecycle};
pub use transport::TransportController;
pub use types::{
    format_time, DurationPolicy, PlaybackConfig, SessionToken, TrackId, TrackSet,
    TransportSnapshot, TransportState,
};
