//! Media binding
//!
//! Wraps one host media element for one stem. Every host failure stops here:
//! it is logged and turned into a degraded track, never an error for the
//! transport.

use crate::error::{HostError, PlaybackError};
use crate::host::{HostEvent, HostEventKind, MediaElement, Subscription};
use crate::types::TrackId;
use crossbeam_channel::Sender;
use tracing::{debug, warn};

/// What a binding reports upward after handling a host event
#[derive(Debug, Clone, PartialEq)]
pub enum BindingNotification {
    /// Duration known for the first time (seconds)
    MetadataReady(f64),

    /// Element became able to start output
    CanPlay,

    /// Position moved (seconds)
    TimeUpdate(f64),

    /// Resource failed; the stem is degraded
    Failed(String),
}

/// Per-stem wrapper around one host media element
pub struct MediaBinding {
    track: TrackId,
    element: Option<Box<dyn MediaElement>>,
    subscription: Option<Subscription>,
    duration: Option<f64>,
    current_time: f64,
    playing: bool,
    metadata_reported: bool,
    failed: bool,
}

impl MediaBinding {
    pub fn new(track: TrackId, element: Box<dyn MediaElement>) -> Self {
        Self {
            track,
            element: Some(element),
            subscription: None,
            duration: None,
            current_time: 0.0,
            playing: false,
            metadata_reported: false,
            failed: false,
        }
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Position the element reports right now, falling back to the last
    /// known one
    pub fn live_time(&self) -> f64 {
        self.element
            .as_ref()
            .map_or(self.current_time, |element| element.current_time())
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_disposed(&self) -> bool {
        self.element.is_none()
    }

    /// Subscribe to the element and begin loading `locator`
    ///
    /// Notifications travel through `sender`. A duration the element already
    /// knows when `load` returns is queued right away so it is not lost.
    pub fn load(&mut self, locator: &str, sender: Sender<HostEvent>) {
        let Some(element) = self.element.as_mut() else {
            return;
        };

        let subscription = Subscription::new(self.track, sender);
        let notifier = subscription.notifier();
        self.subscription = Some(subscription);

        debug!(track = %self.track, locator, "Loading stem");

        if let Err(e) = element.load(locator, notifier.clone()) {
            let error = PlaybackError::MediaLoad {
                track: self.track,
                message: e.to_string(),
            };
            warn!(track = %self.track, error = %error, "Stem failed to load");
            self.failed = true;
            notifier.error(e.to_string());
            return;
        }

        if let Some(duration) = element.duration() {
            notifier.metadata_loaded(duration);
        }
    }

    /// Start output; returns whether the command reached the element
    pub fn play(&mut self) -> bool {
        if self.playing {
            return false;
        }
        let Some(element) = self.element.as_mut() else {
            return false;
        };

        match element.play() {
            Ok(()) => {
                self.playing = true;
                true
            }
            Err(e) => {
                self.log_rejected("play", &e);
                false
            }
        }
    }

    /// Pause output; returns whether the command reached the element
    pub fn pause(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        let Some(element) = self.element.as_mut() else {
            return false;
        };

        self.playing = false;
        if let Err(e) = element.pause() {
            self.log_rejected("pause", &e);
        }
        true
    }

    /// Move to `time` seconds, clamped to the known duration
    ///
    /// Returns the position actually requested, or `None` when the input was
    /// not a finite number or the binding is disposed.
    pub fn seek(&mut self, time: f64) -> Option<f64> {
        if !time.is_finite() {
            debug!(track = %self.track, time, "Ignoring non-finite seek");
            return None;
        }
        let target = clamp_time(time, self.duration);
        let element = self.element.as_mut()?;

        match element.set_current_time(target) {
            Ok(()) => self.current_time = target,
            Err(e) => self.log_rejected("seek", &e),
        }
        Some(target)
    }

    /// Apply an effective volume computed by the mix
    pub fn set_volume(&mut self, effective: f32) {
        let volume = if effective.is_nan() {
            0.0
        } else {
            effective.clamp(0.0, 1.0)
        };
        let Some(element) = self.element.as_mut() else {
            return;
        };

        if let Err(e) = element.set_volume(volume) {
            self.log_rejected("set_volume", &e);
        }
    }

    /// Handle one host event addressed to this binding
    ///
    /// Events from an older subscription, or arriving after dispose, are
    /// ignored.
    pub fn handle_host_event(&mut self, event: &HostEvent) -> Option<BindingNotification> {
        if self.is_disposed() {
            return None;
        }
        let subscription = self.subscription.as_ref()?;
        if event.subscription != subscription.id() || !subscription.is_attached() {
            return None;
        }

        match &event.kind {
            HostEventKind::MetadataLoaded { duration } => {
                if self.metadata_reported || !duration.is_finite() || *duration <= 0.0 {
                    return None;
                }
                self.metadata_reported = true;
                self.duration = Some(*duration);
                debug!(track = %self.track, duration, "Stem metadata ready");
                Some(BindingNotification::MetadataReady(*duration))
            }
            HostEventKind::CanPlay => {
                if self.failed {
                    return None;
                }
                debug!(track = %self.track, "Stem can play");
                Some(BindingNotification::CanPlay)
            }
            HostEventKind::TimeUpdate { current_time } => {
                if !current_time.is_finite() {
                    return None;
                }
                self.current_time = clamp_time(*current_time, self.duration);
                Some(BindingNotification::TimeUpdate(self.current_time))
            }
            HostEventKind::Error { message } => {
                if !self.failed {
                    warn!(track = %self.track, message = %message, "Stem media error");
                }
                self.failed = true;
                Some(BindingNotification::Failed(message.clone()))
            }
        }
    }

    /// Pause, detach notifications and release the element
    ///
    /// Safe to call more than once.
    pub fn dispose(&mut self) {
        let Some(mut element) = self.element.take() else {
            return;
        };

        if self.playing {
            if let Err(e) = element.pause() {
                self.log_rejected("pause", &e);
            }
            self.playing = false;
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.detach();
        }
        element.release();
        debug!(track = %self.track, "Stem disposed");
    }

    fn log_rejected(&self, command: &'static str, e: &HostError) {
        let error = PlaybackError::CommandRejected {
            track: self.track,
            command,
            message: e.to_string(),
        };
        warn!(track = %self.track, error = %error, "Host rejected command");
    }
}

impl Drop for MediaBinding {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn clamp_time(time: f64, duration: Option<f64>) -> f64 {
    let time = time.max(0.0);
    match duration {
        Some(duration) => time.min(duration),
        None => time,
    }
}
