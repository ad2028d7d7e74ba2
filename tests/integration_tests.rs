//! Integration tests for the detection pipeline

use beatmap_dsp::config::{hop_duration, SAMPLE_RATE};
use beatmap_dsp::io::{AudioLoader, SymphoniaLoader};
use beatmap_dsp::{
    detect, AnalysisError, DetectRequest, DetectionFlag, DetectorConfig, OnsetData, SelectionMode,
    TempoDetector,
};
use std::path::{Path, PathBuf};

/// Accent pattern of a sixteenth-note hi-hat line
const ACCENTS: [f32; 4] = [1.0, 0.5, 0.8, 0.5];

/// Decaying noise bursts on every sixteenth note, starting at `phase` seconds
fn click_track(bpm: f64, beats: usize, phase: f64, sample_rate: u32) -> Vec<f32> {
    let sr = sample_rate as f64;
    let period = 60.0 / bpm;
    let seconds = phase + beats as f64 * period + 0.5;
    let mut samples = vec![0.0f32; (seconds * sr) as usize];
    let mut seed = 12345u32;

    for beat in 0..beats {
        for (k, &accent) in ACCENTS.iter().enumerate() {
            let t = phase + beat as f64 * period + k as f64 * period / 4.0;
            let start = (t * sr) as usize;
            for i in 0..2000 {
                if start + i >= samples.len() {
                    break;
                }
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let noise = (seed >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0;
                samples[start + i] += accent * noise * (-(i as f32) / 300.0).exp();
            }
        }
    }
    samples
}

/// Write a mono 16-bit WAV into the OS temp dir
fn write_wav(name: &str, samples: &[f32], sample_rate: u32) -> PathBuf {
    let path = std::env::temp_dir().join(format!("beatmap_dsp_{}_{}.wav", std::process::id(), name));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).expect("Failed to create WAV");
    for &s in samples {
        let value = (s * 0.8 * i16::MAX as f32).round().clamp(i16::MIN as f32, i16::MAX as f32);
        writer.write_sample(value as i16).expect("Failed to write sample");
    }
    writer.finalize().expect("Failed to finalize WAV");
    path
}

/// Onsets on every sixteenth note of a `bpm` grid, with matching envelope peaks
fn sixteenth_onsets(bpm: f64, beats: usize, phase: f64) -> OnsetData {
    let period = 60.0 / bpm;
    let mut frames = Vec::new();
    let mut peaks = Vec::new();
    for beat in 0..beats {
        for (k, &accent) in ACCENTS.iter().enumerate() {
            let t = phase + beat as f64 * period + k as f64 * period / 4.0;
            frames.push((t / hop_duration()).round() as usize);
            peaks.push(accent);
        }
    }
    let mut envelope = vec![0.0f32; frames[frames.len() - 1] + 8];
    for (&frame, &peak) in frames.iter().zip(&peaks) {
        envelope[frame] = peak;
    }
    OnsetData::new(frames, envelope).expect("valid onset data")
}

fn assert_close_to(detected: f64, expected: f64, tolerance: f64) {
    assert!(
        (detected - expected).abs() <= tolerance,
        "BPM should be within {} of {}, got {:.2}",
        tolerance,
        expected,
        detected
    );
}

#[test]
fn test_detect_signal_120bpm() {
    let samples = click_track(120.0, 32, 0.25, SAMPLE_RATE);
    let detection = detect(&DetectRequest::from_signal(&samples, SAMPLE_RATE))
        .expect("Detection should succeed");

    assert_close_to(detection.bpm, 120.0, 1.0);
    assert_eq!(detection.subdivision, 4);
    assert!(detection.metadata.onset_count >= 100);

    let offset = detection.offset.expect("offset requested");
    let add = detection.add.expect("add requested");
    let period = 60.0 / detection.bpm;
    assert!(offset > -period / 2.0 && offset <= period / 2.0);
    assert!(offset.abs() < 0.03, "offset should sit near a pulse, got {}", offset);
    assert!(add >= 0.0);
    assert!(((add + offset) / period - ((add + offset) / period).round()).abs() < 1e-9);
}

#[test]
fn test_detect_wav_file() {
    let samples = click_track(120.0, 32, 0.25, SAMPLE_RATE);
    let path = write_wav("120bpm", &samples, SAMPLE_RATE);

    let result = detect(&DetectRequest::from_path(&path));
    let _ = std::fs::remove_file(&path);
    let detection = result.expect("Detection should succeed");

    assert_close_to(detection.bpm, 120.0, 1.0);
    assert_eq!(detection.subdivision, 4);
    assert!(detection.metadata.processing_time_ms > 0.0);
}

#[test]
fn test_detect_resampled_wav() {
    let samples = click_track(120.0, 32, 0.25, 48000);
    let path = write_wav("120bpm_48k", &samples, 48000);

    let loaded = SymphoniaLoader.load(&path);
    let result = detect(&DetectRequest::from_path(&path));
    let _ = std::fs::remove_file(&path);

    let (resampled, sample_rate) = loaded.expect("WAV should decode");
    assert_eq!(sample_rate, SAMPLE_RATE);
    let expected_len = samples.len() as f64 * SAMPLE_RATE as f64 / 48000.0;
    assert!((resampled.len() as f64 - expected_len).abs() <= 1.0);

    let detection = result.expect("Detection should succeed");
    assert_close_to(detection.bpm, 120.0, 1.0);
}

#[test]
fn test_known_bpm_offset_only() {
    let samples = click_track(120.0, 32, 0.25, SAMPLE_RATE);
    let request = DetectRequest::from_signal(&samples, SAMPLE_RATE).with_bpm(120.0);
    let detection = detect(&request).expect("Detection should succeed");

    assert_eq!(detection.bpm, 120.0);
    assert_eq!(detection.metadata.candidates_scored, 0);
    let grid = detection.beat_grid().expect("offset requested");
    assert!((grid.period() - 0.5).abs() < 1e-12);
    assert!(grid.offset.abs() < 0.03);
}

#[test]
fn test_precomputed_onsets() {
    let onsets = sixteenth_onsets(120.0, 32, 0.0);
    let detector = TempoDetector::new(DetectorConfig {
        selection: SelectionMode::Simple,
        ..DetectorConfig::default()
    })
    .expect("valid config");
    let detection = detector
        .detect(&DetectRequest::from_onsets(&onsets))
        .expect("Detection should succeed");

    assert_eq!(detection.bpm, 120.0);
    assert_eq!(detection.subdivision, 4);
    assert!(detection.metadata.cross_validated.is_empty());
}

#[test]
fn test_off_checkpoint_phase() {
    let onsets = sixteenth_onsets(95.0, 64, 0.1);
    let detection = detect(&DetectRequest::from_onsets(&onsets)).expect("Detection should succeed");

    assert_eq!(detection.bpm, 95.0);
    assert_eq!(detection.subdivision, 4);
    assert!(!detection.has_flag(DetectionFlag::SubdivisionFallback));
}

#[test]
fn test_detection_serializes() {
    let onsets = sixteenth_onsets(120.0, 32, 0.0);
    let detection = detect(&DetectRequest::from_onsets(&onsets)).expect("Detection should succeed");
    let json = serde_json::to_string(&detection).expect("serializable");
    let back: beatmap_dsp::Detection = serde_json::from_str(&json).expect("deserializable");

    assert_eq!(back.bpm, detection.bpm);
    assert_eq!(back.subdivision, detection.subdivision);
    assert_eq!(back.metadata.flags, detection.metadata.flags);
    assert_eq!(back.metadata.onset_count, detection.metadata.onset_count);
    let (a, b) = (back.offset.unwrap(), detection.offset.unwrap());
    assert!((a - b).abs() < 1e-12);

    let config: DetectorConfig =
        serde_json::from_str(r#"{"match_score_checks":32,"selection":"Simple","candidate_source":"FixedRange","parallel_scoring":false}"#)
            .expect("config deserializes");
    assert_eq!(config.match_score_checks, 32);
    assert_eq!(config.selection, SelectionMode::Simple);
}

#[test]
fn test_silence_is_insufficient() {
    let samples = vec![0.0f32; SAMPLE_RATE as usize * 2];
    let result = detect(&DetectRequest::from_signal(&samples, SAMPLE_RATE));
    assert!(matches!(result, Err(AnalysisError::InsufficientData(_))));
}

#[test]
fn test_rejects_contradictory_requests() {
    let samples = vec![0.0f32; 1024];

    assert!(matches!(
        detect(&DetectRequest::default()),
        Err(AnalysisError::InvalidInput(_))
    ));
    assert!(matches!(
        detect(&DetectRequest::from_signal(&samples, 22050)),
        Err(AnalysisError::InvalidInput(_))
    ));
    assert!(matches!(
        detect(
            &DetectRequest::from_signal(&samples, SAMPLE_RATE)
                .with_bpm(120.0)
                .with_offset(false)
        ),
        Err(AnalysisError::InvalidInput(_))
    ));
}

#[test]
fn test_missing_file_is_decoding_error() {
    let result = detect(&DetectRequest::from_path(Path::new("/nonexistent/track.wav")));
    assert!(matches!(result, Err(AnalysisError::DecodingError(_))));
}
