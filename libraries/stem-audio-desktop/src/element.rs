/// CPAL-backed host media element
///
/// **Architecture**: every element gets a dedicated audio thread that owns
/// its CPAL Stream, plus a short-lived loader thread that decodes the stem.
/// The element talks to the audio thread over a channel, avoiding Send/Sync
/// issues with CPAL's Stream type. The audio thread also polls the playback
/// cursor and reports it through the [`HostNotifier`].
use crate::decoder::{resample, resolve_locator, StemDecoder};
use crate::error::{AudioError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::Duration;
use stem_playback::{HostError, HostNotifier, HostResult, MediaElement, MediaHost, TrackId};
use tracing::{debug, warn};

/// Desktop host configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopHostConfig {
    /// How often a playing element reports its position (default: 250)
    pub position_interval_ms: u64,
}

impl Default for DesktopHostConfig {
    fn default() -> Self {
        Self {
            position_interval_ms: 250,
        }
    }
}

/// [`MediaHost`] producing [`CpalElement`]s on the default output device
#[derive(Debug, Clone, Default)]
pub struct DesktopHost {
    config: DesktopHostConfig,
}

impl DesktopHost {
    pub fn new(config: DesktopHostConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DesktopHostConfig {
        &self.config
    }
}

impl MediaHost for DesktopHost {
    fn create_element(&mut self, track: TrackId) -> Box<dyn MediaElement> {
        Box::new(CpalElement::new(
            track,
            Duration::from_millis(self.config.position_interval_ms.max(10)),
        ))
    }
}

/// Commands sent to the audio thread
enum ElementCommand {
    Play,
    Pause,
    Shutdown,
}

/// Shared state between the element, its loader and the audio callback
struct ElementShared {
    /// Decoded samples (interleaved stereo at the device rate), published
    /// once by the loader
    samples: OnceLock<Vec<f32>>,
    /// Playback cursor (in samples, not frames)
    position: AtomicUsize,
    playing: AtomicBool,
    /// Set by the callback when the cursor reached the end
    finished: AtomicBool,
    /// Volume as f32 bits
    volume: AtomicU32,
    duration: Mutex<Option<f64>>,
    /// Cancels a pending load
    abort: AtomicBool,
    sample_rate: u32,
}

impl ElementShared {
    fn new(sample_rate: u32) -> Self {
        Self {
            samples: OnceLock::new(),
            position: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            volume: AtomicU32::new(1.0f32.to_bits()),
            duration: Mutex::new(None),
            abort: AtomicBool::new(false),
            sample_rate,
        }
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    fn current_time(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        let frames = self.position.load(Ordering::Relaxed) / 2;
        frames as f64 / self.sample_rate as f64
    }

    fn duration(&self) -> Option<f64> {
        self.duration.lock().map(|guard| *guard).unwrap_or(None)
    }

    fn set_duration(&self, duration: f64) {
        if let Ok(mut guard) = self.duration.lock() {
            *guard = Some(duration);
        }
    }

    fn set_samples(&self, samples: Vec<f32>) {
        if self.samples.set(samples).is_err() {
            debug!("Stem samples already published");
        }
    }

    fn is_decoded(&self) -> bool {
        self.samples.get().is_some()
    }

    /// Start output; refused until the stem is decoded
    fn start(&self) -> HostResult<()> {
        let Some(samples) = self.samples.get() else {
            return Err(HostError::NotReady);
        };
        // Restart from the top once the end was reached
        if self.position.load(Ordering::Relaxed) + 1 >= samples.len() {
            self.position.store(0, Ordering::Relaxed);
        }
        self.finished.store(false, Ordering::Relaxed);
        self.playing.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn seek(&self, seconds: f64) {
        let frames = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        self.position.store(frames * 2, Ordering::Relaxed);
        self.finished.store(false, Ordering::Relaxed);
    }

    /// Whether the audio thread should report the cursor now
    ///
    /// Never before decoding finished, so a stem still loading cannot pull
    /// the shared position back to zero.
    fn take_time_report(&self) -> bool {
        if !self.is_decoded() {
            return false;
        }
        let finished = self.finished.swap(false, Ordering::Relaxed);
        finished || self.playing.load(Ordering::Relaxed)
    }
}

/// Output handle created by a successful load
struct Loaded {
    command_tx: Sender<ElementCommand>,
    shared: Arc<ElementShared>,
}

/// Host media element playing one stem through CPAL
pub struct CpalElement {
    track: TrackId,
    position_interval: Duration,
    loaded: Option<Loaded>,
    /// Volume requested before the stem was loaded
    initial_volume: f32,
}

impl CpalElement {
    pub fn new(track: TrackId, position_interval: Duration) -> Self {
        Self {
            track,
            position_interval,
            loaded: None,
            initial_volume: 1.0,
        }
    }

    fn loaded(&self) -> HostResult<&Loaded> {
        self.loaded.as_ref().ok_or(HostError::NotReady)
    }

    fn send(&self, command: ElementCommand) -> HostResult<()> {
        self.loaded()?
            .command_tx
            .send(command)
            .map_err(|_| HostError::Failed("audio thread stopped".into()))
    }

    fn open_device() -> Result<(Device, StreamConfig, u32)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::DeviceNotFound)?;
        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate();
        Ok((device, config.config(), sample_rate))
    }

    /// Loader thread: read headers, report early duration, decode, resample
    fn load_stem(path: PathBuf, shared: Arc<ElementShared>, notifier: HostNotifier) {
        let result = (|| -> Result<()> {
            let decoder = StemDecoder::open(&path)?;
            let declared = decoder.duration();
            if let Some(duration) = declared {
                shared.set_duration(duration);
                notifier.metadata_loaded(duration);
            }

            let audio = decoder.decode_all(&shared.abort)?;
            let audio = resample(audio, shared.sample_rate)?;
            let decoded = audio.duration_secs();
            shared.set_samples(audio.samples);

            if declared.is_none() {
                shared.set_duration(decoded);
                notifier.metadata_loaded(decoded);
            }
            notifier.can_play();
            debug!(track = %notifier.track(), path = %path.display(), duration = decoded, "Stem decoded");
            Ok(())
        })();

        match result {
            Ok(()) | Err(AudioError::Aborted) => {}
            Err(e) => {
                warn!(track = %notifier.track(), path = %path.display(), error = %e, "Stem decode failed");
                notifier.error(e.to_string());
            }
        }
    }

    /// Audio thread main loop
    ///
    /// Owns the CPAL Stream. Between commands it reports the cursor every
    /// `interval` while playing, and once more when the stem ends.
    fn audio_thread_run(
        device: Device,
        config: StreamConfig,
        shared: Arc<ElementShared>,
        command_rx: Receiver<ElementCommand>,
        notifier: HostNotifier,
        interval: Duration,
    ) {
        let stream = match Self::build_stream(&device, &config, &shared) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(track = %notifier.track(), error = %e, "Failed to open output stream");
                notifier.error(e.to_string());
                return;
            }
        };

        loop {
            match command_rx.recv_timeout(interval) {
                Ok(ElementCommand::Play) => {
                    if let Err(e) = stream.play() {
                        let e = AudioError::from(e);
                        warn!(track = %notifier.track(), error = %e, "Stream play failed");
                        notifier.error(e.to_string());
                    }
                }
                Ok(ElementCommand::Pause) => {
                    if let Err(e) = stream.pause() {
                        debug!(track = %notifier.track(), error = %e, "Stream pause failed");
                    }
                }
                Ok(ElementCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if shared.take_time_report() {
                        notifier.time_update(shared.current_time());
                    }
                }
            }
        }

        drop(stream);
        debug!(track = %notifier.track(), "Audio thread stopped");
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        shared: &Arc<ElementShared>,
    ) -> Result<Stream> {
        let channels = usize::from(config.channels);
        let state = Arc::clone(shared);
        let stream = device.build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                Self::audio_callback(data, channels, &state);
            },
            |err| warn!(error = %err, "Audio stream error"),
            None,
        )?;
        Ok(stream)
    }

    /// Audio callback (runs in the real-time audio thread)
    fn audio_callback(output: &mut [f32], channels: usize, state: &ElementShared) {
        if !state.playing.load(Ordering::Relaxed) || channels == 0 {
            output.fill(0.0);
            return;
        }

        let Some(buffer) = state.samples.get().filter(|samples| !samples.is_empty()) else {
            output.fill(0.0);
            return;
        };

        let volume = state.volume();
        let mut pos = state.position.load(Ordering::Relaxed);

        for frame in output.chunks_mut(channels) {
            if pos + 1 >= buffer.len() {
                frame.fill(0.0);
                continue;
            }
            let left = buffer[pos] * volume;
            let right = buffer[pos + 1] * volume;
            match frame {
                [mono] => *mono = (left + right) * 0.5,
                [l, r, rest @ ..] => {
                    *l = left;
                    *r = right;
                    rest.fill(0.0);
                }
                [] => {}
            }
            pos += 2;
        }

        state.position.store(pos.min(buffer.len()), Ordering::Relaxed);
        if pos + 1 >= buffer.len() {
            // Reached end, stop playback
            state.playing.store(false, Ordering::Relaxed);
            state.finished.store(true, Ordering::Relaxed);
        }
    }
}

impl MediaElement for CpalElement {
    fn load(&mut self, locator: &str, notifier: HostNotifier) -> HostResult<()> {
        if self.loaded.is_some() {
            return Err(HostError::Failed("element already loaded".into()));
        }

        let path = resolve_locator(locator)?;
        if !path.is_file() {
            return Err(HostError::Failed(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let (device, config, sample_rate) = Self::open_device()?;
        let shared = Arc::new(ElementShared::new(sample_rate));
        shared
            .volume
            .store(self.initial_volume.to_bits(), Ordering::Relaxed);
        let (command_tx, command_rx) = bounded::<ElementCommand>(32);

        let audio_shared = Arc::clone(&shared);
        let audio_notifier = notifier.clone();
        let interval = self.position_interval;
        thread::Builder::new()
            .name(format!("stem-audio-{}", self.track))
            .spawn(move || {
                Self::audio_thread_run(
                    device,
                    config,
                    audio_shared,
                    command_rx,
                    audio_notifier,
                    interval,
                );
            })
            .map_err(|e| HostError::Failed(e.to_string()))?;

        let loader_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name(format!("stem-load-{}", self.track))
            .spawn(move || Self::load_stem(path, loader_shared, notifier))
            .map_err(|e| HostError::Failed(e.to_string()))?;

        self.loaded = Some(Loaded { command_tx, shared });
        Ok(())
    }

    fn play(&mut self) -> HostResult<()> {
        self.loaded()?.shared.start()?;
        self.send(ElementCommand::Play)
    }

    fn pause(&mut self) -> HostResult<()> {
        self.loaded()?.shared.playing.store(false, Ordering::Relaxed);
        self.send(ElementCommand::Pause)
    }

    fn set_current_time(&mut self, seconds: f64) -> HostResult<()> {
        let shared = &self.loaded()?.shared;
        if !seconds.is_finite() {
            return Err(HostError::Unsupported(format!("seek to {seconds}")));
        }
        shared.seek(seconds);
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.loaded
            .as_ref()
            .map_or(0.0, |loaded| loaded.shared.current_time())
    }

    fn duration(&self) -> Option<f64> {
        self.loaded
            .as_ref()
            .and_then(|loaded| loaded.shared.duration())
    }

    fn set_volume(&mut self, volume: f32) -> HostResult<()> {
        let volume = volume.clamp(0.0, 1.0);
        match self.loaded.as_ref() {
            Some(loaded) => loaded
                .shared
                .volume
                .store(volume.to_bits(), Ordering::Relaxed),
            None => self.initial_volume = volume,
        }
        Ok(())
    }

    fn release(&mut self) {
        let Some(loaded) = self.loaded.take() else {
            return;
        };
        loaded.shared.abort.store(true, Ordering::Relaxed);
        loaded.shared.playing.store(false, Ordering::Relaxed);
        // Audio thread exits on Shutdown or when the channel closes
        let _ = loaded.command_tx.send(ElementCommand::Shutdown);
        debug!(track = %self.track, "Element released");
    }
}

impl Drop for CpalElement {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        assert_eq!(DesktopHostConfig::default().position_interval_ms, 250);
    }

    #[test]
    fn commands_before_load_are_not_ready() {
        let mut element = CpalElement::new(TrackId::Vocals, Duration::from_millis(50));
        assert_eq!(element.play(), Err(HostError::NotReady));
        assert_eq!(element.set_current_time(1.0), Err(HostError::NotReady));
        assert_eq!(element.duration(), None);
        assert_eq!(element.current_time(), 0.0);
        assert!(element.set_volume(0.5).is_ok());
        element.release();
    }

    #[test]
    fn callback_applies_volume_and_stops_at_end() {
        let shared = ElementShared::new(4);
        shared.set_samples(vec![0.5, -0.5, 1.0, -1.0]);
        shared.volume.store(0.5f32.to_bits(), Ordering::Relaxed);
        shared.playing.store(true, Ordering::Relaxed);

        let mut output = [9.0f32; 6];
        CpalElement::audio_callback(&mut output, 2, &shared);

        assert_eq!(output, [0.25, -0.25, 0.5, -0.5, 0.0, 0.0]);
        assert!(!shared.playing.load(Ordering::Relaxed));
        assert!(shared.finished.load(Ordering::Relaxed));
        assert_eq!(shared.current_time(), 0.5);
    }

    #[test]
    fn callback_downmixes_to_mono_device() {
        let shared = ElementShared::new(4);
        shared.set_samples(vec![0.2, 0.4, 0.0, 0.0]);
        shared.playing.store(true, Ordering::Relaxed);

        let mut output = [0.0f32; 1];
        CpalElement::audio_callback(&mut output, 1, &shared);

        assert!((output[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn paused_callback_outputs_silence() {
        let shared = ElementShared::new(4);
        shared.set_samples(vec![1.0; 8]);

        let mut output = [5.0f32; 4];
        CpalElement::audio_callback(&mut output, 2, &shared);

        assert_eq!(output, [0.0; 4]);
        assert_eq!(shared.position.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn play_is_refused_until_decoded() {
        let shared = ElementShared::new(4);
        shared.playing.store(false, Ordering::Relaxed);

        assert_eq!(shared.start(), Err(HostError::NotReady));
        assert!(!shared.playing.load(Ordering::Relaxed));

        shared.set_samples(vec![0.1; 16]);
        assert_eq!(shared.start(), Ok(()));
        assert!(shared.playing.load(Ordering::Relaxed));
    }

    #[test]
    fn no_time_reports_while_decoding() {
        let shared = ElementShared::new(4);
        shared.playing.store(true, Ordering::Relaxed);
        shared.finished.store(true, Ordering::Relaxed);
        assert!(!shared.take_time_report());

        shared.set_samples(vec![0.1; 16]);
        assert!(shared.take_time_report());
        shared.playing.store(false, Ordering::Relaxed);
        assert!(shared.take_time_report(), "finished flag reports once");
        assert!(!shared.take_time_report());
    }

    #[test]
    fn stem_decoded_late_stays_aligned() {
        let early = ElementShared::new(4);
        let late = ElementShared::new(4);
        early.set_samples(vec![0.1; 40]);
        early.start().unwrap();
        assert_eq!(late.start(), Err(HostError::NotReady));

        let mut output = [0.0f32; 8];
        CpalElement::audio_callback(&mut output, 2, &early);
        CpalElement::audio_callback(&mut output, 2, &late);
        assert_eq!(late.position.load(Ordering::Relaxed), 0);

        // Decode done: the transport seeks the late stem to the running one
        late.set_samples(vec![0.1; 40]);
        late.seek(early.current_time());
        late.start().unwrap();

        CpalElement::audio_callback(&mut output, 2, &early);
        CpalElement::audio_callback(&mut output, 2, &late);
        assert_eq!(
            early.position.load(Ordering::Relaxed),
            late.position.load(Ordering::Relaxed)
        );
        assert_eq!(early.current_time(), late.current_time());
    }

    #[test]
    fn start_at_end_rewinds() {
        let shared = ElementShared::new(4);
        shared.set_samples(vec![0.1; 8]);
        shared.position.store(8, Ordering::Relaxed);

        shared.start().unwrap();
        assert_eq!(shared.position.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn missing_file_fails_load() {
        let mut element = CpalElement::new(TrackId::Drums, Duration::from_millis(50));
        let (tx, _rx) = crossbeam_channel::unbounded();
        let subscription = stem_playback::Subscription::new(TrackId::Drums, tx);

        let result = element.load("/definitely/not/here.wav", subscription.notifier());
        assert!(matches!(result, Err(HostError::Failed(_))));
    }
}
