//! Performance benchmarks for BPM/offset detection

use beatmap_dsp::config::{hop_duration, SAMPLE_RATE};
use beatmap_dsp::features::onset::{OnsetExtractor, SpectralFluxExtractor};
use beatmap_dsp::features::period::candidate_scorer::score_candidates;
use beatmap_dsp::{DetectRequest, DetectorConfig, OnsetData, TempoDetector};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Sixteenth-note onsets at `bpm` for `seconds`
fn synthetic_onsets(bpm: f64, seconds: f64) -> OnsetData {
    let pulse = 60.0 / bpm / 4.0;
    let count = (seconds / pulse) as usize;
    let frames: Vec<usize> = (0..count)
        .map(|i| (i as f64 * pulse / hop_duration()).round() as usize)
        .collect();
    let mut envelope = vec![0.0f32; frames[frames.len() - 1] + 8];
    for (i, &frame) in frames.iter().enumerate() {
        envelope[frame] = if i % 4 == 0 { 1.0 } else { 0.5 };
    }
    OnsetData::new(frames, envelope).unwrap()
}

fn bench_detect_onsets(c: &mut Criterion) {
    let onsets = synthetic_onsets(120.0, 180.0);
    let request = DetectRequest::from_onsets(&onsets);

    for (name, parallel) in [("detect_onsets_3min_parallel", true), ("detect_onsets_3min_sequential", false)] {
        let detector = TempoDetector::new(DetectorConfig {
            parallel_scoring: parallel,
            ..DetectorConfig::default()
        })
        .unwrap();
        c.bench_function(name, |b| {
            b.iter(|| detector.detect(black_box(&request)));
        });
    }
}

fn bench_score_candidates(c: &mut Criterion) {
    let times = synthetic_onsets(128.0, 180.0).times();
    let bpms: Vec<f64> = (180..360).map(|s| s as f64 * 0.5).collect();

    c.bench_function("score_candidates_180", |b| {
        b.iter(|| score_candidates(black_box(&times), black_box(&bpms), 16, false));
    });
}

fn bench_onset_extraction(c: &mut Criterion) {
    // Generate synthetic audio (30 seconds at 44.1kHz)
    let samples: Vec<f32> = (0..SAMPLE_RATE as usize * 30)
        .map(|i| {
            let t = i % (SAMPLE_RATE as usize / 8);
            (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 44100.0).sin() * (-(t as f32) / 500.0).exp()
        })
        .collect();
    let extractor = SpectralFluxExtractor::default();

    c.bench_function("spectral_flux_30s", |b| {
        b.iter(|| extractor.extract(black_box(&samples), SAMPLE_RATE));
    });
}

criterion_group!(benches, bench_detect_onsets, bench_score_candidates, bench_onset_extraction);
criterion_main!(benches);
