//! Stem decoding using Symphonia
//!
//! A stem is decoded completely into memory as interleaved stereo f32, then
//! converted to the output device rate. Stems are short enough (one song)
//! that seeking is just moving an index.
//!
//! ## Format Conversion
//!
//! Every Symphonia sample type goes through one generic interleaving helper
//! with a per-format normalization function:
//! - **Float formats**: pass through (F32) or cast (F64)
//! - **Signed ints**: divide by MAX
//! - **Unsigned ints**: normalize to [0,1], scale to [-1,1]
//!
//! Mono is duplicated to both channels; extra channels are dropped.

use crate::error::{AudioError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::debug;
use url::Url;

/// Decoded stem, interleaved stereo
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Opened, probed stem ready to decode
pub struct StemDecoder {
    path: PathBuf,
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    duration: Option<f64>,
}

impl StemDecoder {
    /// Open and probe `path`
    ///
    /// Only reads the container header, so the duration (when the container
    /// declares it) is available before any audio is decoded.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let format_reader = probed.format;

        let track = format_reader
            .default_track()
            .ok_or_else(|| AudioError::UnsupportedFormat("no audio track".into()))?;

        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let track_id = track.id;
        let duration = track
            .codec_params
            .n_frames
            .map(|frames| frames as f64 / sample_rate as f64)
            .filter(|secs| *secs > 0.0);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;

        debug!(
            path = %path.display(),
            sample_rate,
            duration = ?duration,
            "Stem probed"
        );

        Ok(Self {
            path,
            format_reader,
            decoder,
            track_id,
            sample_rate,
            duration,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sample rate of the file
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration declared by the container, if any
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Decode every packet
    ///
    /// Checks `abort` between packets and returns [`AudioError::Aborted`]
    /// once it is set. Corrupt packets are skipped.
    pub fn decode_all(mut self, abort: &AtomicBool) -> Result<DecodedAudio> {
        let mut samples = Vec::new();

        loop {
            if abort.load(Ordering::Relaxed) {
                return Err(AudioError::Aborted);
            }

            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(e.into()),
            };

            // Skip packets from other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => append_stereo_f32(decoded, &mut samples),
                Err(SymphoniaError::DecodeError(message)) => {
                    debug!(path = %self.path.display(), reason = message, "Skipping corrupt packet");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(DecodedAudio {
            samples,
            sample_rate: self.sample_rate,
        })
    }
}

/// Interleave any planar buffer to stereo f32
fn interleave_to_stereo_f32<T, F>(buf: &AudioBuffer<T>, normalize: F, output: &mut Vec<f32>)
where
    T: Sample,
    F: Fn(T) -> f32,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    output.reserve(frames * 2);

    for frame_idx in 0..frames {
        let left = normalize(buf.chan(0)[frame_idx]);
        let right = if channels > 1 {
            normalize(buf.chan(1)[frame_idx])
        } else {
            left
        };
        output.push(left);
        output.push(right);
    }
}

fn append_stereo_f32(decoded: AudioBufferRef, output: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => interleave_to_stereo_f32(&buf, |s| s, output),
        AudioBufferRef::F64(buf) => interleave_to_stereo_f32(&buf, |s| s as f32, output),
        AudioBufferRef::S8(buf) => {
            interleave_to_stereo_f32(&buf, |s| s as f32 / i8::MAX as f32, output);
        }
        AudioBufferRef::S16(buf) => {
            interleave_to_stereo_f32(&buf, |s| s as f32 / i16::MAX as f32, output);
        }
        AudioBufferRef::S24(buf) => {
            interleave_to_stereo_f32(&buf, |s| s.inner() as f32 / 8388607.0, output);
        }
        AudioBufferRef::S32(buf) => {
            interleave_to_stereo_f32(&buf, |s| s as f32 / i32::MAX as f32, output);
        }
        AudioBufferRef::U8(buf) => {
            interleave_to_stereo_f32(&buf, |s| (s as f32 / u8::MAX as f32) * 2.0 - 1.0, output);
        }
        AudioBufferRef::U16(buf) => {
            interleave_to_stereo_f32(&buf, |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0, output);
        }
        AudioBufferRef::U24(buf) => {
            interleave_to_stereo_f32(
                &buf,
                |s| (s.inner() as f32 / 16777215.0) * 2.0 - 1.0,
                output,
            );
        }
        AudioBufferRef::U32(buf) => {
            interleave_to_stereo_f32(&buf, |s| (s as f32 / u32::MAX as f32) * 2.0 - 1.0, output);
        }
    }
}

/// Convert `audio` to `target_rate`
///
/// Returns the input unchanged when the rates already match.
pub fn resample(audio: DecodedAudio, target_rate: u32) -> Result<DecodedAudio> {
    if audio.sample_rate == target_rate || audio.frames() == 0 {
        return Ok(audio);
    }

    let frames = audio.frames();
    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        target_rate as f64 / audio.sample_rate as f64,
        2.0,
        params,
        frames,
        2,
    )
    .map_err(|e| AudioError::ResampleError(e.to_string()))?;

    // Deinterleave input samples
    let mut deinterleaved = vec![Vec::with_capacity(frames); 2];
    for frame in audio.samples.chunks_exact(2) {
        deinterleaved[0].push(frame[0]);
        deinterleaved[1].push(frame[1]);
    }

    let resampled = resampler
        .process(&deinterleaved, None)
        .map_err(|e| AudioError::ResampleError(e.to_string()))?;

    // Interleave output samples
    let output_frames = resampled[0].len();
    let mut samples = Vec::with_capacity(output_frames * 2);
    for (left, right) in resampled[0].iter().zip(&resampled[1]) {
        samples.push(*left);
        samples.push(*right);
    }

    debug!(
        from = audio.sample_rate,
        to = target_rate,
        frames_in = frames,
        frames_out = output_frames,
        "Stem resampled"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: target_rate,
    })
}

/// Turn a locator into a local file path
///
/// Accepts plain paths and `file://` URLs. Anything else (http, data, ...)
/// must be downloaded by the caller first.
pub fn resolve_locator(locator: &str) -> Result<PathBuf> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(AudioError::UnsupportedLocator(String::new()));
    }

    match Url::parse(locator) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|()| AudioError::UnsupportedLocator(locator.to_string())),
        // Windows drive letters parse as a one-letter scheme
        Ok(url) if url.scheme().len() > 1 => {
            Err(AudioError::UnsupportedLocator(locator.to_string()))
        }
        _ => Ok(PathBuf::from(locator)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_plain_path() {
        assert_eq!(
            resolve_locator("/tmp/stems/vocals.wav").unwrap(),
            PathBuf::from("/tmp/stems/vocals.wav")
        );
        assert_eq!(
            resolve_locator("stems/drums.wav").unwrap(),
            PathBuf::from("stems/drums.wav")
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolve_file_url() {
        assert_eq!(
            resolve_locator("file:///tmp/my%20song_bass.wav").unwrap(),
            PathBuf::from("/tmp/my song_bass.wav")
        );
    }

    #[test]
    fn reject_remote_locators() {
        assert!(matches!(
            resolve_locator("http://localhost:7860/api/download/s1/vocals"),
            Err(AudioError::UnsupportedLocator(_))
        ));
        assert!(matches!(
            resolve_locator("  "),
            Err(AudioError::UnsupportedLocator(_))
        ));
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let audio = DecodedAudio {
            samples: vec![0.1, 0.2, 0.3, 0.4],
            sample_rate: 48000,
        };
        assert_eq!(resample(audio.clone(), 48000).unwrap(), audio);
    }

    #[test]
    fn resample_scales_frame_count() {
        let frames = 44100;
        let samples = (0..frames)
            .flat_map(|i| {
                let s = (i as f32 * 440.0 * std::f32::consts::TAU / 44100.0).sin() * 0.5;
                [s, s]
            })
            .collect();
        let audio = DecodedAudio {
            samples,
            sample_rate: 44100,
        };

        let out = resample(audio, 48000).unwrap();
        assert_eq!(out.sample_rate, 48000);
        let expected = 48000.0;
        let ratio = out.frames() as f64 / expected;
        assert!((0.95..=1.05).contains(&ratio), "got {} frames", out.frames());
        assert!(out.samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn decoded_duration() {
        let audio = DecodedAudio {
            samples: vec![0.0; 2 * 22050],
            sample_rate: 44100,
        };
        assert_eq!(audio.frames(), 22050);
        assert!((audio.duration_secs() - 0.5).abs() < 1e-9);
    }
}
