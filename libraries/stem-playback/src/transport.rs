//! Transport controller - unified play/pause/seek across stems
//!
//! Holds one [`MediaBinding`] per stem in registration order and fans every
//! command out to all of them. Host notifications come back in through
//! [`TransportController::handle_host_event`].

use crate::{
    binding::{BindingNotification, MediaBinding},
    events::PlaybackEvent,
    host::HostEvent,
    mix::VolumeTarget,
    registry::TrackRegistry,
    types::{DurationPolicy, TrackId, TransportSnapshot, TransportState},
};
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

/// Synchronized transport over a set of stem bindings
pub struct TransportController {
    state: TransportState,
    bindings: Vec<MediaBinding>,
    is_playing: bool,
    current_time: f64,
    duration: Option<f64>,
    duration_policy: DurationPolicy,

    // Event queue
    pending_events: Vec<PlaybackEvent>,
}

impl TransportController {
    /// Create an idle transport over `bindings` (registration order)
    pub fn new(bindings: Vec<MediaBinding>, duration_policy: DurationPolicy) -> Self {
        Self {
            state: TransportState::Idle,
            bindings,
            is_playing: false,
            current_time: 0.0,
            duration: None,
            duration_policy,
            pending_events: Vec::new(),
        }
    }

    // ===== Lifecycle =====

    /// Fan `load` out to every binding and enter `Loading`
    ///
    /// Only valid from `Idle`; later calls are ignored.
    pub fn start(&mut self, registry: &TrackRegistry, sender: &Sender<HostEvent>) {
        if self.state != TransportState::Idle {
            debug!(state = ?self.state, "Ignoring start on non-idle transport");
            return;
        }
        self.set_state(TransportState::Loading);

        for binding in &mut self.bindings {
            match registry.locator(binding.track()) {
                Ok(locator) => binding.load(locator, sender.clone()),
                Err(e) => warn!(track = %binding.track(), error = %e, "No locator for stem"),
            }
        }
    }

    /// Pause everything, release every binding and enter `Disposed`
    ///
    /// Terminal and idempotent.
    pub fn dispose(&mut self) {
        if self.state == TransportState::Disposed {
            return;
        }

        for binding in &mut self.bindings {
            binding.pause();
        }
        for binding in &mut self.bindings {
            binding.dispose();
        }
        self.bindings.clear();
        self.is_playing = false;
        self.set_state(TransportState::Disposed);
    }

    // ===== Host notifications =====

    /// Apply one host notification
    ///
    /// Ignored once disposed, or when the addressed binding discards it.
    pub fn handle_host_event(&mut self, event: &HostEvent) {
        if self.state == TransportState::Disposed {
            return;
        }
        let Some(index) = self
            .bindings
            .iter()
            .position(|binding| binding.track() == event.track)
        else {
            return;
        };
        let Some(notification) = self.bindings[index].handle_host_event(event) else {
            return;
        };

        match notification {
            BindingNotification::MetadataReady(duration) => {
                self.on_metadata_ready(index, duration);
            }
            BindingNotification::CanPlay => self.on_can_play(index),
            BindingNotification::TimeUpdate(time) => {
                self.current_time = self.clamp_to_duration(time);
                self.emit_position();
            }
            BindingNotification::Failed(message) => {
                self.pending_events.push(PlaybackEvent::TrackFailed {
                    track: event.track,
                    message,
                });
            }
        }
    }

    fn on_metadata_ready(&mut self, index: usize, duration: f64) {
        let adopt = match (self.duration, self.duration_policy) {
            (None, _) => true,
            (Some(current), DurationPolicy::Shortest) => duration < current,
            (Some(_), DurationPolicy::FirstReported) => false,
        };

        if adopt {
            debug!(track = %self.bindings[index].track(), duration, "Transport duration set");
            self.duration = Some(duration);
            self.pending_events
                .push(PlaybackEvent::DurationChanged { duration });

            let clamped = self.clamp_to_duration(self.current_time);
            if clamped != self.current_time {
                for binding in &mut self.bindings {
                    binding.seek(clamped);
                }
                self.current_time = clamped;
                self.emit_position();
            }
        }

        if self.state == TransportState::Loading {
            self.set_state(TransportState::Ready);
        }

        // A toggle during loading may have been refused by this element
        self.resume_late_binding(index);
    }

    /// A stem finished buffering after the others
    ///
    /// While paused it is only moved to the shared position, so the next
    /// `play` starts every stem from the same place.
    fn on_can_play(&mut self, index: usize) {
        if self.is_playing {
            self.resume_late_binding(index);
        } else {
            let target = self.clamp_to_duration(self.current_time);
            self.bindings[index].seek(target);
        }
    }

    /// Start a binding that refused `play` while the others already run
    ///
    /// The binding is first moved to where the running stems are, so it
    /// joins in lockstep instead of from its own start.
    fn resume_late_binding(&mut self, index: usize) {
        if !self.is_playing || self.bindings[index].is_playing() {
            return;
        }

        let target = self.sync_position(index);
        let binding = &mut self.bindings[index];
        binding.seek(target);
        if binding.play() {
            debug!(track = %binding.track(), position = target, "Late stem joined playback");
        }
    }

    /// Live position of the first running stem other than `index`
    fn sync_position(&self, index: usize) -> f64 {
        let live = self
            .bindings
            .iter()
            .enumerate()
            .find(|(i, binding)| *i != index && binding.is_playing() && !binding.is_failed())
            .map(|(_, binding)| binding.live_time());
        self.clamp_to_duration(live.unwrap_or(self.current_time))
    }

    // ===== Playback Control =====

    /// Flip between playing and paused
    ///
    /// Returns the new play status. No-op when idle or disposed.
    pub fn toggle_play_pause(&mut self) -> bool {
        if self.is_playing {
            self.pause();
        } else {
            self.play();
        }
        self.is_playing
    }

    /// Command every stem to play
    pub fn play(&mut self) {
        if self.is_playing || !self.accepts_commands() {
            return;
        }

        self.is_playing = true;
        for binding in &mut self.bindings {
            binding.play();
        }
        self.set_state(TransportState::Playing);
    }

    /// Command every stem to pause
    pub fn pause(&mut self) {
        if !self.is_playing || !self.accepts_commands() {
            return;
        }

        self.is_playing = false;
        for binding in &mut self.bindings {
            binding.pause();
        }
        self.set_state(TransportState::Paused);
    }

    /// Move every stem to `time` seconds
    ///
    /// The time is clamped to `[0, duration]`. Returns the position applied,
    /// or `None` for non-finite input or an idle/disposed transport.
    pub fn seek(&mut self, time: f64) -> Option<f64> {
        if !self.accepts_commands() || !time.is_finite() {
            return None;
        }

        let target = self.clamp_to_duration(time);
        for binding in &mut self.bindings {
            binding.seek(target);
        }
        self.current_time = target;
        self.emit_position();
        Some(target)
    }

    /// Seek to a fraction (0.0-1.0) of the duration
    ///
    /// No-op while the duration is unknown.
    pub fn seek_to_fraction(&mut self, fraction: f64) -> Option<f64> {
        let duration = self.duration?;
        if fraction.is_nan() {
            return None;
        }
        self.seek(fraction.clamp(0.0, 1.0) * duration)
    }

    /// Apply an effective volume to one stem's binding
    pub fn set_binding_volume(&mut self, track: TrackId, effective: f32) {
        if let Some(binding) = self
            .bindings
            .iter_mut()
            .find(|binding| binding.track() == track)
        {
            binding.set_volume(effective);
        }
    }

    // ===== Queries =====

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Current position in seconds
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Unified duration, once any stem reported it
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        TransportSnapshot {
            state: self.state,
            is_playing: self.is_playing,
            current_time: self.current_time,
            duration: self.duration,
        }
    }

    /// Bindings in registration order (empty once disposed)
    pub fn bindings(&self) -> &[MediaBinding] {
        &self.bindings
    }

    pub fn binding(&self, track: TrackId) -> Option<&MediaBinding> {
        self.bindings.iter().find(|binding| binding.track() == track)
    }

    /// Drain pending events
    ///
    /// Returns all events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ===== Internal =====

    fn accepts_commands(&self) -> bool {
        !matches!(
            self.state,
            TransportState::Idle | TransportState::Disposed
        )
    }

    fn clamp_to_duration(&self, time: f64) -> f64 {
        let time = time.max(0.0);
        match self.duration {
            Some(duration) => time.min(duration),
            None => time,
        }
    }

    fn set_state(&mut self, state: TransportState) {
        if self.state == state {
            return;
        }
        info!(from = ?self.state, to = ?state, "Transport state changed");
        self.state = state;
        self.pending_events
            .push(PlaybackEvent::StateChanged { state });
    }

    fn emit_position(&mut self) {
        self.pending_events.push(PlaybackEvent::PositionUpdate {
            current_time: self.current_time,
            duration: self.duration,
        });
    }
}

impl VolumeTarget for TransportController {
    fn apply_volume(&mut self, track: TrackId, effective: f32) {
        self.set_binding_volume(track, effective);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MediaHost;
    use crate::memory::{HostCommand, MemoryHost};
    use crate::types::TrackSet;
    use crossbeam_channel::{unbounded, Receiver};

    struct Fixture {
        host: MemoryHost,
        transport: TransportController,
        rx: Receiver<HostEvent>,
    }

    impl Fixture {
        fn new(host: MemoryHost, policy: DurationPolicy) -> Self {
            let set = TrackSet::new()
                .with_track(TrackId::Vocals, "vocals.wav")
                .with_track(TrackId::Drums, "drums.wav");
            let mut registry = TrackRegistry::new();
            registry.register(&set).unwrap();

            let mut factory = host.clone();
            let bindings = registry
                .ids()
                .into_iter()
                .map(|id| MediaBinding::new(id, factory.create_element(id)))
                .collect();

            let (tx, rx) = unbounded();
            let mut transport = TransportController::new(bindings, policy);
            transport.start(&registry, &tx);
            Self { host, transport, rx }
        }

        fn pump(&mut self) {
            for event in self.rx.try_iter().collect::<Vec<_>>() {
                self.transport.handle_host_event(&event);
            }
        }
    }

    fn fixture() -> Fixture {
        Fixture::new(MemoryHost::new(), DurationPolicy::FirstReported)
    }

    #[test]
    fn start_enters_loading_and_loads_in_order() {
        let f = fixture();
        assert_eq!(f.transport.state(), TransportState::Loading);
        assert_eq!(
            f.host.element(TrackId::Vocals).unwrap().commands(),
            vec![HostCommand::Load("vocals.wav".to_string())]
        );
        assert_eq!(
            f.host.element(TrackId::Drums).unwrap().commands(),
            vec![HostCommand::Load("drums.wav".to_string())]
        );
    }

    #[test]
    fn first_metadata_sets_duration_and_ready_once() {
        let mut f = fixture();
        f.transport.drain_events();

        f.host.element(TrackId::Drums).unwrap().report_duration(180.0);
        f.host.element(TrackId::Vocals).unwrap().report_duration(175.0);
        f.pump();

        assert_eq!(f.transport.state(), TransportState::Ready);
        assert_eq!(f.transport.duration(), Some(180.0));
        assert_eq!(
            f.transport.drain_events(),
            vec![
                PlaybackEvent::DurationChanged { duration: 180.0 },
                PlaybackEvent::StateChanged {
                    state: TransportState::Ready
                },
            ]
        );
    }

    #[test]
    fn shortest_policy_takes_minimum_and_reclamps() {
        let mut f = Fixture::new(MemoryHost::new(), DurationPolicy::Shortest);
        f.host.element(TrackId::Drums).unwrap().report_duration(180.0);
        f.pump();
        f.transport.toggle_play_pause();
        f.transport.seek(178.0);

        f.host.element(TrackId::Vocals).unwrap().report_duration(175.0);
        f.pump();

        assert_eq!(f.transport.duration(), Some(175.0));
        assert_eq!(f.transport.current_time(), 175.0);
        assert_eq!(f.transport.state(), TransportState::Playing);
        // Stems past the new end are moved back to it
        assert_eq!(f.host.element(TrackId::Drums).unwrap().last_seek(), Some(175.0));
        assert_eq!(f.host.element(TrackId::Vocals).unwrap().last_seek(), Some(175.0));
    }

    #[test]
    fn shorter_duration_inside_position_does_not_seek() {
        let mut f = Fixture::new(MemoryHost::new(), DurationPolicy::Shortest);
        f.host.element(TrackId::Drums).unwrap().report_duration(180.0);
        f.pump();
        f.transport.seek(20.0);
        f.host.element(TrackId::Drums).unwrap().clear_commands();

        f.host.element(TrackId::Vocals).unwrap().report_duration(175.0);
        f.pump();

        assert_eq!(f.transport.current_time(), 20.0);
        assert_eq!(f.host.element(TrackId::Drums).unwrap().last_seek(), None);
    }

    #[test]
    fn toggle_is_strict_and_not_reforwarded() {
        let mut f = fixture();
        f.host.element(TrackId::Vocals).unwrap().report_duration(60.0);
        f.pump();

        assert!(f.transport.toggle_play_pause());
        assert_eq!(f.transport.state(), TransportState::Playing);
        f.transport.play();
        assert!(!f.transport.toggle_play_pause());
        assert_eq!(f.transport.state(), TransportState::Paused);

        for track in [TrackId::Vocals, TrackId::Drums] {
            let commands = f.host.element(track).unwrap().commands();
            let plays = commands.iter().filter(|c| **c == HostCommand::Play).count();
            assert_eq!(plays, 1, "{track} played more than once");
        }
    }

    #[test]
    fn toggle_while_loading_keeps_playing_through_metadata() {
        let mut f = fixture();
        assert!(f.transport.toggle_play_pause());
        assert_eq!(f.transport.state(), TransportState::Playing);

        f.host.element(TrackId::Vocals).unwrap().report_duration(90.0);
        f.pump();

        assert_eq!(f.transport.state(), TransportState::Playing);
        assert_eq!(f.transport.duration(), Some(90.0));
    }

    #[test]
    fn refused_early_play_is_retried_on_metadata() {
        let host = MemoryHost::new().reject_play(TrackId::Drums);
        let mut f = Fixture::new(host, DurationPolicy::FirstReported);
        f.transport.toggle_play_pause();
        assert!(!f.transport.binding(TrackId::Drums).unwrap().is_playing());

        f.host.element(TrackId::Drums).unwrap().report_duration(30.0);
        f.pump();

        let commands = f.host.element(TrackId::Drums).unwrap().commands();
        let plays = commands.iter().filter(|c| **c == HostCommand::Play).count();
        assert_eq!(plays, 2);
        assert!(f.transport.binding(TrackId::Vocals).unwrap().is_playing());
    }

    #[test]
    fn stem_decoded_late_joins_at_running_position() {
        let host = MemoryHost::new().reject_play(TrackId::Drums);
        let mut f = Fixture::new(host, DurationPolicy::FirstReported);
        let vocals = f.host.element(TrackId::Vocals).unwrap();
        let drums = f.host.element(TrackId::Drums).unwrap();

        // Both durations known, only vocals decoded
        vocals.report_duration(120.0);
        drums.report_duration(120.0);
        f.pump();
        f.transport.toggle_play_pause();
        assert!(vocals.is_playing());
        assert!(!drums.is_playing());

        vocals.report_time(12.0);
        f.pump();
        vocals.report_time(12.75);
        drums.report_can_play();
        f.pump();

        assert!(drums.is_playing());
        assert!(f.transport.binding(TrackId::Drums).unwrap().is_playing());
        assert_eq!(drums.last_seek(), Some(12.75));
    }

    #[test]
    fn can_play_while_paused_does_not_start_output() {
        let host = MemoryHost::new().reject_play(TrackId::Drums);
        let mut f = Fixture::new(host, DurationPolicy::FirstReported);
        let drums = f.host.element(TrackId::Drums).unwrap();
        drums.report_duration(60.0);
        drums.report_can_play();
        f.pump();

        assert_eq!(f.transport.state(), TransportState::Ready);
        assert!(!drums.is_playing());
        assert!(!drums.commands().contains(&HostCommand::Play));
    }

    #[test]
    fn stem_decoded_during_pause_is_parked_at_position() {
        let host = MemoryHost::new().reject_play(TrackId::Drums);
        let mut f = Fixture::new(host, DurationPolicy::FirstReported);
        let vocals = f.host.element(TrackId::Vocals).unwrap();
        let drums = f.host.element(TrackId::Drums).unwrap();
        vocals.report_duration(90.0);
        f.pump();

        f.transport.toggle_play_pause();
        vocals.report_time(30.0);
        f.pump();
        f.transport.toggle_play_pause();

        drums.report_can_play();
        f.pump();
        assert!(!drums.is_playing());
        assert_eq!(drums.last_seek(), Some(30.0));

        f.transport.toggle_play_pause();
        assert!(drums.is_playing());
    }

    #[test]
    fn seek_clamps_and_reaches_every_binding() {
        let mut f = fixture();
        f.host.element(TrackId::Drums).unwrap().report_duration(180.0);
        f.pump();

        assert_eq!(f.transport.seek(200.0), Some(180.0));
        assert_eq!(f.host.element(TrackId::Vocals).unwrap().last_seek(), Some(180.0));
        assert_eq!(f.host.element(TrackId::Drums).unwrap().last_seek(), Some(180.0));

        assert_eq!(f.transport.seek(-4.0), Some(0.0));
        assert_eq!(f.transport.seek(f64::NAN), None);
        assert_eq!(f.transport.current_time(), 0.0);
        assert!(!f.transport.is_playing());
    }

    #[test]
    fn seek_to_fraction_needs_duration() {
        let mut f = fixture();
        assert_eq!(f.transport.seek_to_fraction(0.5), None);

        f.host.element(TrackId::Vocals).unwrap().report_duration(200.0);
        f.pump();
        assert_eq!(f.transport.seek_to_fraction(0.25), Some(50.0));
        assert_eq!(f.transport.seek_to_fraction(3.0), Some(200.0));
    }

    #[test]
    fn time_updates_are_last_writer_wins_and_clamped() {
        let mut f = fixture();
        f.host.element(TrackId::Vocals).unwrap().report_duration(100.0);
        f.host.element(TrackId::Vocals).unwrap().report_time(10.0);
        f.host.element(TrackId::Drums).unwrap().report_time(10.5);
        f.pump();
        assert_eq!(f.transport.current_time(), 10.5);

        f.host.element(TrackId::Drums).unwrap().report_time(150.0);
        f.pump();
        assert_eq!(f.transport.current_time(), 100.0);
    }

    #[test]
    fn failed_stem_emits_event_and_others_keep_working() {
        let host = MemoryHost::new().fail_load(TrackId::Vocals);
        let mut f = Fixture::new(host, DurationPolicy::FirstReported);
        f.pump();

        let events = f.transport.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            PlaybackEvent::TrackFailed { track: TrackId::Vocals, .. }
        )));

        f.host.element(TrackId::Drums).unwrap().report_duration(42.0);
        f.pump();
        f.transport.toggle_play_pause();
        assert!(f.host.element(TrackId::Drums).unwrap().is_playing());
    }

    #[test]
    fn dispose_is_terminal() {
        let mut f = fixture();
        f.host.element(TrackId::Vocals).unwrap().report_duration(100.0);
        f.pump();
        f.transport.toggle_play_pause();

        f.transport.dispose();
        f.transport.dispose();

        assert_eq!(f.transport.state(), TransportState::Disposed);
        assert!(f.transport.bindings().is_empty());
        assert_eq!(f.transport.seek(10.0), None);
        assert!(!f.transport.toggle_play_pause());

        for track in [TrackId::Vocals, TrackId::Drums] {
            let element = f.host.element(track).unwrap();
            assert!(element.is_released());
            assert!(!element.is_playing());
        }

        f.host.element(TrackId::Vocals).unwrap().report_time(5.0);
        f.pump();
        assert_eq!(f.transport.current_time(), 0.0);
    }

    #[test]
    fn idle_transport_ignores_commands() {
        let mut transport = TransportController::new(Vec::new(), DurationPolicy::default());
        assert!(!transport.toggle_play_pause());
        assert_eq!(transport.seek(1.0), None);
        assert_eq!(transport.state(), TransportState::Idle);
        assert!(transport.drain_events().is_empty());
    }
}
