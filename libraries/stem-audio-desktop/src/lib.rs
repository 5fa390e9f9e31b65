//! Desktop host media subsystem for Stem Player
//!
//! Implements the `stem-playback` host traits with CPAL output and Symphonia
//! decoding, one output stream per stem.
//!
//! # Features
//!
//! - Local paths and `file://` locators
//! - Any format Symphonia decodes (WAV, FLAC, MP3, OGG, AAC, ...)
//! - Automatic sample rate conversion to the device rate
//! - Per-stem volume applied in the audio callback
//! - Position reports every `position_interval_ms` while playing
//!
//! # Example
//!
//! ```no_run
//! use stem_audio_desktop::{DesktopHost, DesktopHostConfig};
//! use stem_playback::{PlaybackConfig, SessionLifecycle, TrackId, TrackSet};
//!
//! let host = DesktopHost::new(DesktopHostConfig::default());
//! let mut session = SessionLifecycle::new(host, PlaybackConfig::default());
//! session
//!     .start(
//!         TrackSet::new()
//!             .with_track(TrackId::Vocals, "song_vocals.wav")
//!             .with_track(TrackId::Drums, "song_drums.wav"),
//!     )
//!     .unwrap();
//! session.wait_and_pump(std::time::Duration::from_secs(5));
//! session.toggle_play_pause();
//! ```

mod decoder;
mod element;
mod error;

pub use decoder::{resample, resolve_locator, DecodedAudio, StemDecoder};
pub use element::{CpalElement, DesktopHost, DesktopHostConfig};
pub use error::{AudioError, Result};
