//! Host media subsystem abstraction
//!
//! The host owns decoding and output for each stem. Stem playback only drives
//! it through [`MediaElement`] and listens to what it reports through a
//! [`HostNotifier`]. Platform code (cpal on desktop, an in-memory host in
//! tests) provides the implementations.

use crate::error::HostResult;
use crate::types::TrackId;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// One playable media resource owned by the host
///
/// Mirrors what a host audio element offers: asynchronous load, transport
/// commands, position and duration queries, volume and release. Progress is
/// never polled by the caller. The element reports it through the notifier
/// handed to [`MediaElement::load`].
pub trait MediaElement: Send {
    /// Begin preparing the resource
    ///
    /// Must return quickly. Duration and progress arrive later through
    /// `notifier`. Hosts that know the duration synchronously may also
    /// expose it via [`MediaElement::duration`] right away.
    fn load(&mut self, locator: &str, notifier: HostNotifier) -> HostResult<()>;

    /// Start or resume output
    fn play(&mut self) -> HostResult<()>;

    /// Pause output, keeping the position
    fn pause(&mut self) -> HostResult<()>;

    /// Move the playback position (seconds)
    fn set_current_time(&mut self, seconds: f64) -> HostResult<()>;

    /// Current playback position (seconds)
    fn current_time(&self) -> f64;

    /// Duration in seconds, once known
    fn duration(&self) -> Option<f64>;

    /// Apply a linear volume in `[0, 1]`
    fn set_volume(&mut self, volume: f32) -> HostResult<()>;

    /// Release the underlying resource
    ///
    /// Called exactly once per element, after which no other method is called.
    fn release(&mut self);
}

/// Factory for host media elements
pub trait MediaHost {
    /// Create an unloaded element for `track`
    fn create_element(&mut self, track: TrackId) -> Box<dyn MediaElement>;
}

/// Identifies one binding's subscription to its element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }
}

/// Something the host reported about one element
#[derive(Debug, Clone, PartialEq)]
pub enum HostEventKind {
    /// Duration became known (seconds)
    MetadataLoaded { duration: f64 },

    /// Media is buffered and `play` will now be accepted
    ///
    /// Only hosts whose elements refuse `play` after metadata is known
    /// (still decoding) need to send it.
    CanPlay,

    /// Playback position moved (seconds)
    TimeUpdate { current_time: f64 },

    /// The resource failed to load or play
    Error { message: String },
}

/// Host notification tagged with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    pub track: TrackId,
    pub subscription: SubscriptionId,
    pub kind: HostEventKind,
}

/// Scoped subscription held by a binding
///
/// While attached, notifiers created from it deliver events. Detaching cuts
/// every clone of the notifier at once, so a host thread that outlives the
/// binding can keep calling it harmlessly.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    track: TrackId,
    attached: Arc<AtomicBool>,
    sender: Sender<HostEvent>,
}

impl Subscription {
    /// Subscribe `track` to the session's notification channel
    pub fn new(track: TrackId, sender: Sender<HostEvent>) -> Self {
        Self {
            id: SubscriptionId::next(),
            track,
            attached: Arc::new(AtomicBool::new(true)),
            sender,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Notifier handed to the host element
    pub fn notifier(&self) -> HostNotifier {
        HostNotifier {
            id: self.id,
            track: self.track,
            attached: Arc::clone(&self.attached),
            sender: self.sender.clone(),
        }
    }

    /// Stop delivering notifications
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Handle a host element uses to report progress
///
/// Cheap to clone and `Send`, so hosts can move it onto their own threads.
/// Sends after the subscription is detached or the session is gone are
/// dropped silently.
#[derive(Debug, Clone)]
pub struct HostNotifier {
    id: SubscriptionId,
    track: TrackId,
    attached: Arc<AtomicBool>,
    sender: Sender<HostEvent>,
}

impl HostNotifier {
    pub fn track(&self) -> TrackId {
        self.track
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub fn metadata_loaded(&self, duration: f64) {
        self.send(HostEventKind::MetadataLoaded { duration });
    }

    pub fn can_play(&self) {
        self.send(HostEventKind::CanPlay);
    }

    pub fn time_update(&self, current_time: f64) {
        self.send(HostEventKind::TimeUpdate { current_time });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(HostEventKind::Error {
            message: message.into(),
        });
    }

    fn send(&self, kind: HostEventKind) {
        if !self.is_attached() {
            return;
        }
        // Receiver gone means the session ended; nothing left to inform.
        let _ = self.sender.send(HostEvent {
            track: self.track,
            subscription: self.id,
            kind,
        });
    }
}
