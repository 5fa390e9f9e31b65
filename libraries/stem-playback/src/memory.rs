//! In-memory host media subsystem
//!
//! Plays nothing. Every element records the commands it receives and exposes
//! a handle for delivering host notifications by hand. Used by the test
//! suites, and useful for headless runs of the playback logic.
//!
//! Released elements keep their notifier, like a host thread that has not
//! noticed the release yet. Reports made through them after dispose must be
//! dropped by the subscription, not by the element.

use crate::error::{HostError, HostResult};
use crate::host::{HostNotifier, MediaElement, MediaHost};
use crate::types::TrackId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Command received by a [`MemoryElement`]
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Load(String),
    Play,
    Pause,
    Seek(f64),
    SetVolume(f32),
    Release,
}

#[derive(Debug, Default)]
struct ElementState {
    commands: Vec<HostCommand>,
    notifier: Option<HostNotifier>,
    duration: Option<f64>,
    current_time: f64,
    playing: bool,
    volume: f32,
    released: bool,
    immediate_duration: Option<f64>,
    fail_load: bool,
    reject_play: bool,
    reject_seek: bool,
}

/// Host element that records commands
pub struct MemoryElement {
    state: Arc<Mutex<ElementState>>,
}

fn lock(state: &Mutex<ElementState>) -> MutexGuard<'_, ElementState> {
    // A panicking test thread must not hide the recorded commands.
    state
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl MediaElement for MemoryElement {
    fn load(&mut self, locator: &str, notifier: HostNotifier) -> HostResult<()> {
        let mut state = lock(&self.state);
        state.commands.push(HostCommand::Load(locator.to_string()));
        if state.fail_load {
            return Err(HostError::Failed(format!("cannot open {locator}")));
        }
        state.notifier = Some(notifier);
        state.duration = state.immediate_duration;
        Ok(())
    }

    fn play(&mut self) -> HostResult<()> {
        let mut state = lock(&self.state);
        state.commands.push(HostCommand::Play);
        if state.reject_play {
            return Err(HostError::NotReady);
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> HostResult<()> {
        let mut state = lock(&self.state);
        state.commands.push(HostCommand::Pause);
        state.playing = false;
        Ok(())
    }

    fn set_current_time(&mut self, seconds: f64) -> HostResult<()> {
        let mut state = lock(&self.state);
        state.commands.push(HostCommand::Seek(seconds));
        if state.reject_seek {
            return Err(HostError::NotReady);
        }
        state.current_time = seconds;
        Ok(())
    }

    fn current_time(&self) -> f64 {
        lock(&self.state).current_time
    }

    fn duration(&self) -> Option<f64> {
        lock(&self.state).duration
    }

    fn set_volume(&mut self, volume: f32) -> HostResult<()> {
        let mut state = lock(&self.state);
        state.commands.push(HostCommand::SetVolume(volume));
        state.volume = volume;
        Ok(())
    }

    fn release(&mut self) {
        let mut state = lock(&self.state);
        state.commands.push(HostCommand::Release);
        state.released = true;
        state.playing = false;
    }
}

/// Test-side view of a [`MemoryElement`]
#[derive(Clone)]
pub struct MemoryElementHandle {
    state: Arc<Mutex<ElementState>>,
}

impl MemoryElementHandle {
    /// Commands received so far, oldest first
    pub fn commands(&self) -> Vec<HostCommand> {
        lock(&self.state).commands.clone()
    }

    pub fn clear_commands(&self) {
        lock(&self.state).commands.clear();
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.state).playing
    }

    pub fn is_released(&self) -> bool {
        lock(&self.state).released
    }

    pub fn volume(&self) -> f32 {
        lock(&self.state).volume
    }

    pub fn current_time(&self) -> f64 {
        lock(&self.state).current_time
    }

    /// Last seek target received, if any
    pub fn last_seek(&self) -> Option<f64> {
        lock(&self.state)
            .commands
            .iter()
            .rev()
            .find_map(|command| match command {
                HostCommand::Seek(time) => Some(*time),
                _ => None,
            })
    }

    /// Simulate the host finishing metadata loading
    pub fn report_duration(&self, duration: f64) {
        let notifier = {
            let mut state = lock(&self.state);
            state.duration = Some(duration);
            state.notifier.clone()
        };
        if let Some(notifier) = notifier {
            notifier.metadata_loaded(duration);
        }
    }

    /// Simulate the host finishing buffering
    ///
    /// Lifts a `reject_play` setting, like an element that refused `play`
    /// until its media was decoded.
    pub fn report_can_play(&self) {
        let notifier = {
            let mut state = lock(&self.state);
            state.reject_play = false;
            state.notifier.clone()
        };
        if let Some(notifier) = notifier {
            notifier.can_play();
        }
    }

    /// Simulate a host position update
    pub fn report_time(&self, current_time: f64) {
        let notifier = {
            let mut state = lock(&self.state);
            state.current_time = current_time;
            state.notifier.clone()
        };
        if let Some(notifier) = notifier {
            notifier.time_update(current_time);
        }
    }

    /// Simulate a host media error
    pub fn report_error(&self, message: &str) {
        let notifier = lock(&self.state).notifier.clone();
        if let Some(notifier) = notifier {
            notifier.error(message);
        }
    }

    /// Notifier the element was loaded with, kept even after release
    pub fn notifier(&self) -> Option<HostNotifier> {
        lock(&self.state).notifier.clone()
    }
}

#[derive(Default)]
struct HostState {
    elements: HashMap<TrackId, Vec<MemoryElementHandle>>,
    immediate_durations: HashMap<TrackId, f64>,
    fail_load: HashSet<TrackId>,
    reject_play: HashSet<TrackId>,
    reject_seek: HashSet<TrackId>,
}

/// In-memory [`MediaHost`]
///
/// Clones share state, so a test can keep one clone while the session owns
/// another.
#[derive(Clone, Default)]
pub struct MemoryHost {
    state: Arc<Mutex<HostState>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements for `track` know their duration as soon as `load` returns
    pub fn with_immediate_duration(self, track: TrackId, duration: f64) -> Self {
        self.host_state()
            .immediate_durations
            .insert(track, duration);
        self
    }

    /// Elements for `track` fail to load
    pub fn fail_load(self, track: TrackId) -> Self {
        self.host_state().fail_load.insert(track);
        self
    }

    /// Elements for `track` reject `play`
    pub fn reject_play(self, track: TrackId) -> Self {
        self.host_state().reject_play.insert(track);
        self
    }

    /// Elements for `track` reject seeking
    pub fn reject_seek(self, track: TrackId) -> Self {
        self.host_state().reject_seek.insert(track);
        self
    }

    /// Most recently created element for `track`
    pub fn element(&self, track: TrackId) -> Option<MemoryElementHandle> {
        self.host_state()
            .elements
            .get(&track)
            .and_then(|elements| elements.last().cloned())
    }

    /// Every element ever created for `track`, oldest first
    pub fn elements(&self, track: TrackId) -> Vec<MemoryElementHandle> {
        self.host_state()
            .elements
            .get(&track)
            .cloned()
            .unwrap_or_default()
    }

    fn host_state(&self) -> MutexGuard<'_, HostState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl MediaHost for MemoryHost {
    fn create_element(&mut self, track: TrackId) -> Box<dyn MediaElement> {
        let mut host = self.host_state();
        let state = Arc::new(Mutex::new(ElementState {
            volume: 1.0,
            immediate_duration: host.immediate_durations.get(&track).copied(),
            fail_load: host.fail_load.contains(&track),
            reject_play: host.reject_play.contains(&track),
            reject_seek: host.reject_seek.contains(&track),
            ..ElementState::default()
        }));

        host.elements
            .entry(track)
            .or_default()
            .push(MemoryElementHandle {
                state: Arc::clone(&state),
            });

        Box::new(MemoryElement { state })
    }
}
