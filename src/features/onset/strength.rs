//! Mel spectral-flux onset strength
//!
//! Computes the onset-strength envelope the tempo pipeline was tuned on.
//!
//! # Algorithm
//!
//! 1. Centred STFT (zero padding of `n_fft / 2` on both sides), Hann window,
//!    `n_fft = 2048`, hop `HOP_SIZE`
//! 2. Power spectrum → 128-band mel filterbank (Slaney scale and area norm)
//! 3. Power to dB relative to the loudest cell, floored 80 dB below it
//! 4. Flux: `max(0, S[t] - S[t - 1])` per band, averaged across bands
//! 5. Shift right by `1 + n_fft / (2 * hop)` frames so that flux values line
//!    up with the frames they describe, truncated to the frame count
//!
//! # Example
//!
//! ```no_run
//! use beatmap_dsp::features::onset::{OnsetExtractor, SpectralFluxExtractor};
//!
//! let samples = vec![0.0f32; 44100 * 10];
//! let onsets = SpectralFluxExtractor::default().extract(&samples, 44100)?;
//! println!("{} onsets", onsets.len());
//! # Ok::<(), beatmap_dsp::AnalysisError>(())
//! ```

use std::f32::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::config::HOP_SIZE;
use crate::error::AnalysisError;

use super::peak_picking::{pick_onsets, PeakPickConfig};
use super::{OnsetData, OnsetExtractor};

/// Floor for power values before the log
const POWER_FLOOR: f32 = 1e-10;

/// One triangular mel filter, stored sparsely
#[derive(Debug, Clone)]
struct MelFilter {
    first_bin: usize,
    weights: Vec<f32>,
}

fn hz_to_mel(hz: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let log_step = 6.4f64.ln() / 27.0;
    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / log_step
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let log_step = 6.4f64.ln() / 27.0;
    if mel >= min_log_mel {
        MIN_LOG_HZ * (log_step * (mel - min_log_mel)).exp()
    } else {
        mel * F_SP
    }
}

/// Slaney-normalised triangular filters from 0 Hz to Nyquist
fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<MelFilter> {
    let n_bins = n_fft / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;
    let mel_max = hz_to_mel(nyquist);
    let edges: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();
    let bin_hz = |k: usize| k as f64 * sample_rate as f64 / n_fft as f64;

    (0..n_mels)
        .map(|m| {
            let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
            let norm = 2.0 / (hi - lo);
            let mut first_bin = None;
            let mut weights = Vec::new();
            for k in 0..n_bins {
                let f = bin_hz(k);
                let rising = (f - lo) / (center - lo);
                let falling = (hi - f) / (hi - center);
                let w = rising.min(falling).max(0.0) * norm;
                if w > 0.0 {
                    first_bin.get_or_insert(k);
                    weights.push(w as f32);
                } else if first_bin.is_some() {
                    break;
                }
            }
            MelFilter {
                first_bin: first_bin.unwrap_or(0),
                weights,
            }
        })
        .collect()
}

/// Mel spectral-flux onset extractor
#[derive(Debug, Clone)]
pub struct SpectralFluxExtractor {
    /// FFT size (default: 2048)
    pub n_fft: usize,
    /// Number of mel bands (default: 128)
    pub n_mels: usize,
    /// Dynamic range kept below the loudest cell, in dB (default: 80)
    pub top_db: f32,
    /// Onset peak picking windows
    pub peaks: PeakPickConfig,
}

impl Default for SpectralFluxExtractor {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            n_mels: 128,
            top_db: 80.0,
            peaks: PeakPickConfig::default(),
        }
    }
}

impl SpectralFluxExtractor {
    /// Mel power spectrogram in dB, one `Vec` of `n_mels` values per frame
    fn mel_db_frames(&self, samples: &[f32], sample_rate: u32) -> Vec<Vec<f32>> {
        let n_fft = self.n_fft;
        let pad = n_fft / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let n_frames = 1 + (padded.len() - n_fft) / HOP_SIZE;
        let window: Vec<f32> = (0..n_fft)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n_fft as f32).cos())
            .collect();
        let filters = mel_filterbank(sample_rate, n_fft, self.n_mels);

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        let mut power = vec![0.0f32; n_fft / 2 + 1];

        let mut frames = Vec::with_capacity(n_frames);
        let mut max_db = f32::MIN;
        for t in 0..n_frames {
            let start = t * HOP_SIZE;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * window[i], 0.0);
            }
            fft.process(&mut buffer);
            for (p, c) in power.iter_mut().zip(&buffer) {
                *p = c.norm_sqr();
            }

            let mel_db: Vec<f32> = filters
                .iter()
                .map(|filter| {
                    let energy: f32 = filter
                        .weights
                        .iter()
                        .zip(&power[filter.first_bin..])
                        .map(|(w, p)| w * p)
                        .sum();
                    10.0 * energy.max(POWER_FLOOR).log10()
                })
                .collect();
            for &v in &mel_db {
                max_db = max_db.max(v);
            }
            frames.push(mel_db);
        }

        // Reference the loudest cell and clip the dynamic range
        let floor = -self.top_db;
        for frame in frames.iter_mut() {
            for v in frame.iter_mut() {
                *v = (*v - max_db).max(floor);
            }
        }

        frames
    }

    /// Onset-strength envelope, one value per hop
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty signal, a zero sample rate, or an FFT size
    /// smaller than the hop.
    pub fn onset_strength(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>, AnalysisError> {
        if samples.is_empty() {
            return Err(AnalysisError::InvalidInput("Empty audio samples".to_string()));
        }
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidInput("Invalid sample rate: 0".to_string()));
        }
        if self.n_fft < HOP_SIZE || self.n_mels == 0 {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid STFT parameters: n_fft={}, n_mels={}",
                self.n_fft, self.n_mels
            )));
        }

        let frames = self.mel_db_frames(samples, sample_rate);
        let n_frames = frames.len();

        let shift = 1 + self.n_fft / (2 * HOP_SIZE);
        let mut envelope = vec![0.0f32; n_frames];
        for t in 1..n_frames {
            let target = t - 1 + shift;
            if target >= n_frames {
                break;
            }
            let flux: f32 = frames[t]
                .iter()
                .zip(&frames[t - 1])
                .map(|(cur, prev)| (cur - prev).max(0.0))
                .sum();
            envelope[target] = flux / self.n_mels as f32;
        }

        log::debug!(
            "Onset strength: {} samples -> {} frames (n_fft={}, n_mels={})",
            samples.len(),
            n_frames,
            self.n_fft,
            self.n_mels
        );

        Ok(envelope)
    }
}

impl OnsetExtractor for SpectralFluxExtractor {
    fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<OnsetData, AnalysisError> {
        let envelope = self.onset_strength(samples, sample_rate)?;
        let frames = pick_onsets(&envelope, &self.peaks);
        OnsetData::new(frames, envelope)
    }
}
