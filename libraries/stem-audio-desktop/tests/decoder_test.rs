//! Decoder tests against WAV fixtures
//!
//! No audio device needed: these cover probing, full decode, channel
//! conversion, abort and rate conversion.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use stem_audio_desktop::{resample, AudioError, StemDecoder};
use tempfile::TempDir;

/// Write a sine WAV fixture
fn create_test_wav(
    path: &Path,
    duration_secs: f32,
    channels: u16,
    sample_rate: u32,
) -> hound::Result<()> {
    use hound::{WavSpec, WavWriter};

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;

    let num_frames = (sample_rate as f32 * duration_secs) as usize;
    for i in 0..num_frames {
        let t = i as f32 / sample_rate as f32;
        let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
        let amplitude = (i16::MAX as f32 * 0.5 * sample) as i16;
        for _ in 0..channels {
            writer.write_sample(amplitude)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

#[test]
fn probe_reports_declared_duration() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("song_vocals.wav");
    create_test_wav(&path, 2.0, 2, 44100).unwrap();

    let decoder = StemDecoder::open(&path).unwrap();
    assert_eq!(decoder.sample_rate(), 44100);
    let duration = decoder.duration().unwrap();
    assert!((duration - 2.0).abs() < 0.01, "duration was {duration}");
}

#[test]
fn decode_all_yields_stereo_frames() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("song_drums.wav");
    create_test_wav(&path, 1.0, 2, 22050).unwrap();

    let audio = StemDecoder::open(&path)
        .unwrap()
        .decode_all(&AtomicBool::new(false))
        .unwrap();

    assert_eq!(audio.sample_rate, 22050);
    assert_eq!(audio.frames(), 22050);
    assert!((audio.duration_secs() - 1.0).abs() < 0.01);
    assert!(audio.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
}

#[test]
fn mono_is_duplicated_to_both_channels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("song_bass.wav");
    create_test_wav(&path, 0.5, 1, 8000).unwrap();

    let audio = StemDecoder::open(&path)
        .unwrap()
        .decode_all(&AtomicBool::new(false))
        .unwrap();

    assert_eq!(audio.frames(), 4000);
    for frame in audio.samples.chunks_exact(2) {
        assert_eq!(frame[0], frame[1]);
    }
}

#[test]
fn abort_stops_decoding() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("song_other.wav");
    create_test_wav(&path, 1.0, 2, 44100).unwrap();

    let result = StemDecoder::open(&path)
        .unwrap()
        .decode_all(&AtomicBool::new(true));

    assert!(matches!(result, Err(AudioError::Aborted)));
}

#[test]
fn decoded_stem_converts_to_device_rate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("song_vocals.wav");
    create_test_wav(&path, 1.0, 2, 44100).unwrap();

    let audio = StemDecoder::open(&path)
        .unwrap()
        .decode_all(&AtomicBool::new(false))
        .unwrap();
    let converted = resample(audio, 48000).unwrap();

    assert_eq!(converted.sample_rate, 48000);
    assert!((converted.duration_secs() - 1.0).abs() < 0.05);
}

#[test]
fn missing_file_is_io_error() {
    let result = StemDecoder::open("/no/such/stem.wav");
    assert!(matches!(result, Err(AudioError::Io(_))));
}

#[test]
fn non_audio_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.wav");
    std::fs::write(&path, b"this is not audio at all").unwrap();

    assert!(StemDecoder::open(&path).is_err());
}
