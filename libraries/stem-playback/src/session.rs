//! Session lifecycle
//!
//! A session is one track set being played: registry, bindings, transport
//! and mix, plus the channel host notifications arrive on. Starting a new
//! session tears the old one down first. Ending notifies the cleanup
//! collaborator so the server can drop its copy of the stems.

use crate::{
    error::{PlaybackError, Result},
    events::PlaybackEvent,
    host::{HostEvent, MediaHost},
    mix::{MixEntry, MixState},
    registry::{TrackMetadata, TrackRegistry},
    transport::TransportController,
    binding::MediaBinding,
    types::{PlaybackConfig, SessionToken, TrackId, TrackSet, TransportSnapshot, TransportState},
};
use crossbeam_channel::{unbounded, Receiver};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Collaborator told when a server-side session can be released
///
/// Failures are logged by the caller and never surfaced to the user.
pub trait SessionCleanup {
    fn cleanup(&self, token: &SessionToken) -> Result<()>;
}

struct ActiveSession {
    token: Option<SessionToken>,
    registry: TrackRegistry,
    transport: TransportController,
    mix: MixState,
    receiver: Receiver<HostEvent>,
}

/// Owner of the current playback session
///
/// Not a global: the caller holds it and drives it from one thread.
pub struct SessionLifecycle {
    host: Box<dyn MediaHost>,
    cleanup: Option<Box<dyn SessionCleanup>>,
    config: PlaybackConfig,
    active: Option<ActiveSession>,
    last_state: TransportState,

    // Event queue
    pending_events: Vec<PlaybackEvent>,
}

impl SessionLifecycle {
    pub fn new(host: impl MediaHost + 'static, config: PlaybackConfig) -> Self {
        Self {
            host: Box::new(host),
            cleanup: None,
            config,
            active: None,
            last_state: TransportState::Idle,
            pending_events: Vec::new(),
        }
    }

    /// Notify `cleanup` whenever a session with a token ends
    pub fn with_cleanup(mut self, cleanup: impl SessionCleanup + 'static) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    // ===== Lifecycle =====

    /// Start playing `track_set`, replacing any current session
    ///
    /// An empty set fails with [`PlaybackError::EmptyTrackSet`] and leaves
    /// the current session untouched. Returns the stems in registration
    /// order.
    pub fn start(&mut self, track_set: TrackSet) -> Result<Vec<TrackId>> {
        let mut registry = TrackRegistry::new();
        let ids = registry.register(&track_set)?;

        if self.active.is_some() {
            debug!("Replacing current session");
            self.teardown(self.config.cleanup_on_replace);
        }

        let bindings = ids
            .iter()
            .map(|id| MediaBinding::new(*id, self.host.create_element(*id)))
            .collect();

        let (sender, receiver) = unbounded();
        let mut transport = TransportController::new(bindings, self.config.duration_policy);
        let mix = MixState::new(&ids);

        self.pending_events
            .push(PlaybackEvent::SessionStarted { tracks: ids.clone() });
        mix.apply_all(&mut transport);
        transport.start(&registry, &sender);
        self.pending_events.extend(transport.drain_events());

        info!(
            tracks = ids.len(),
            session = track_set.session_token().map(SessionToken::as_str),
            "Session started"
        );

        self.active = Some(ActiveSession {
            token: track_set.session_token().cloned(),
            registry,
            transport,
            mix,
            receiver,
        });
        Ok(ids)
    }

    /// Tear the session down and notify cleanup
    ///
    /// No-op without a session.
    pub fn end(&mut self) {
        if self.active.is_none() {
            return;
        }
        self.teardown(true);
    }

    fn teardown(&mut self, notify_cleanup: bool) {
        let Some(mut session) = self.active.take() else {
            return;
        };

        session.transport.dispose();
        self.pending_events.extend(session.transport.drain_events());
        self.pending_events.push(PlaybackEvent::SessionEnded);
        self.last_state = TransportState::Disposed;
        info!("Session ended");

        if !notify_cleanup {
            return;
        }
        if let (Some(cleanup), Some(token)) = (self.cleanup.as_ref(), session.token.as_ref()) {
            if let Err(e) = cleanup.cleanup(token) {
                warn!(session = %token, error = %e, "Session cleanup failed");
            }
        }
    }

    // ===== Host notifications =====

    /// Apply every pending host notification
    ///
    /// Returns how many were processed.
    pub fn pump(&mut self) -> usize {
        let Some(session) = self.active.as_mut() else {
            return 0;
        };

        let mut processed = 0;
        while let Ok(event) = session.receiver.try_recv() {
            session.transport.handle_host_event(&event);
            processed += 1;
        }
        self.pending_events.extend(session.transport.drain_events());
        processed
    }

    /// Block up to `timeout` for a host notification, then drain the rest
    pub fn wait_and_pump(&mut self, timeout: Duration) -> usize {
        let Some(session) = self.active.as_mut() else {
            return 0;
        };

        match session.receiver.recv_timeout(timeout) {
            Ok(event) => {
                session.transport.handle_host_event(&event);
                1 + self.pump()
            }
            Err(_) => 0,
        }
    }

    // ===== Transport =====

    /// Flip play/pause; returns the new play status
    pub fn toggle_play_pause(&mut self) -> bool {
        self.with_transport(TransportController::toggle_play_pause)
            .unwrap_or(false)
    }

    pub fn play(&mut self) {
        self.with_transport(TransportController::play);
    }

    pub fn pause(&mut self) {
        self.with_transport(TransportController::pause);
    }

    /// Seek every stem to `time` seconds; returns the clamped position
    pub fn seek(&mut self, time: f64) -> Option<f64> {
        self.with_transport(|transport| transport.seek(time))
            .flatten()
    }

    /// Seek to a fraction of the duration; no-op while it is unknown
    pub fn seek_to_fraction(&mut self, fraction: f64) -> Option<f64> {
        self.with_transport(|transport| transport.seek_to_fraction(fraction))
            .flatten()
    }

    fn with_transport<T>(&mut self, f: impl FnOnce(&mut TransportController) -> T) -> Option<T> {
        let session = self.active.as_mut()?;
        let result = f(&mut session.transport);
        self.pending_events.extend(session.transport.drain_events());
        Some(result)
    }

    // ===== Mix =====

    /// Set a stem's volume (0.0-1.0)
    pub fn set_volume(&mut self, track: TrackId, volume: f32) -> Result<MixEntry> {
        let session = self.active.as_mut().ok_or(PlaybackError::NotFound(track))?;
        let entry = session
            .mix
            .set_volume(track, volume, &mut session.transport)?;
        self.push_volume_event(track, entry);
        Ok(entry)
    }

    /// Flip a stem's mute flag
    pub fn toggle_mute(&mut self, track: TrackId) -> Result<MixEntry> {
        let session = self.active.as_mut().ok_or(PlaybackError::NotFound(track))?;
        let entry = session.mix.toggle_mute(track, &mut session.transport)?;
        self.push_volume_event(track, entry);
        Ok(entry)
    }

    /// Volume actually applied to a stem (0 when muted)
    pub fn effective_volume(&self, track: TrackId) -> Result<f32> {
        self.session(track)?.mix.effective_volume(track)
    }

    pub fn mix_entry(&self, track: TrackId) -> Result<MixEntry> {
        self.session(track)?.mix.entry(track)
    }

    fn push_volume_event(&mut self, track: TrackId, entry: MixEntry) {
        self.pending_events.push(PlaybackEvent::VolumeChanged {
            track,
            volume: entry.volume,
            muted: entry.muted,
            effective: entry.effective(),
        });
    }

    // ===== Queries =====

    pub fn has_session(&self) -> bool {
        self.active.is_some()
    }

    pub fn session_token(&self) -> Option<&SessionToken> {
        self.active.as_ref().and_then(|session| session.token.as_ref())
    }

    /// Stems of the current session in registration order
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.active
            .as_ref()
            .map(|session| session.registry.ids())
            .unwrap_or_default()
    }

    pub fn metadata(&self, track: TrackId) -> Result<&TrackMetadata> {
        self.session(track)?.registry.metadata(track)
    }

    pub fn locator(&self, track: TrackId) -> Result<&str> {
        self.session(track)?.registry.locator(track)
    }

    /// Whether a stem of the current session has failed
    pub fn is_track_failed(&self, track: TrackId) -> bool {
        self.active
            .as_ref()
            .and_then(|session| session.transport.binding(track))
            .is_some_and(MediaBinding::is_failed)
    }

    pub fn state(&self) -> TransportState {
        self.active
            .as_ref()
            .map_or(self.last_state, |session| session.transport.state())
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        match self.active.as_ref() {
            Some(session) => session.transport.snapshot(),
            None => TransportSnapshot {
                state: self.last_state,
                is_playing: false,
                current_time: 0.0,
                duration: None,
            },
        }
    }

    /// Drain pending events
    ///
    /// Returns all events queued since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn session(&self, track: TrackId) -> Result<&ActiveSession> {
        self.active.as_ref().ok_or(PlaybackError::NotFound(track))
    }
}
