//! Inter-onset gap ballpark estimation
//!
//! Derives a coarse tempo band from the spacing of consecutive onsets.
//!
//! # Algorithm
//!
//! 1. Compute consecutive onset-frame differences ("gaps")
//! 2. Histogram the gaps; gaps at or below the band, or beyond the histogram,
//!    are octave-folded first (see [`fold_gap`])
//! 3. Octave-compress the histogram tail: walking down from the top, the
//!    energy of each pair of bins `(2k - 1, 2k)` is folded into bin `k` until
//!    all energy lies inside `(GAP_MIN_FRAMES, GAP_MAX_FRAMES]`
//! 4. Slide a 5-bin window weighted by `1 / (1 + distance)` over the band and
//!    keep the centre with the largest weighted sum
//! 5. Convert `centre ± 2` frames to a BPM band, assuming four pulses per beat
//! 6. Split bands that cross the tempo ceiling so the halved tempi are kept
//!
//! # Example
//!
//! ```
//! use beatmap_dsp::features::period::gap_estimator::estimate_ballpark;
//!
//! // One onset every 43 frames (~120 BPM at 44.1 kHz, hop 512)
//! let onsets: Vec<usize> = (0..32).map(|i| i * 43).collect();
//! let estimate = estimate_ballpark(&onsets)?;
//! assert!(estimate.min_bpm < 120.0 && estimate.max_bpm > 120.0);
//! # Ok::<(), beatmap_dsp::AnalysisError>(())
//! ```

use crate::config::{
    hop_duration, BPM_CEILING, GAP_MAX_FRAMES, GAP_MIN_FRAMES, GAP_PULSES_PER_BEAT,
    GAP_WINDOW_BINS,
};
use crate::error::AnalysisError;

use super::{bpm_steps, step_to_bpm};

/// Histogram spans two octaves above the band; longer gaps are folded on insert
const HISTOGRAM_LEN: usize = 4 * GAP_MAX_FRAMES + 1;

/// Coarse tempo band derived from the gap histogram
#[derive(Debug, Clone, PartialEq)]
pub struct GapEstimate {
    /// Centre of the dominant gap cluster (frames)
    pub center_frames: usize,

    /// Slowest tempo of the band
    pub min_bpm: f64,

    /// Fastest tempo of the band (before ceiling split)
    pub max_bpm: f64,

    /// Sorted, deduplicated BPM candidates at `BPM_PRECISION` steps
    pub candidates: Vec<f64>,
}

/// Fold a gap (frames) into `(GAP_MIN_FRAMES, GAP_MAX_FRAMES]`
///
/// Doubles while below the band, halves (rounding half up) while above it,
/// then doubles once more if the result still sits on the lower bound.
/// A zero gap is returned unchanged.
pub fn fold_gap(gap: usize) -> usize {
    if gap == 0 {
        return 0;
    }
    let mut g = gap;
    while g < GAP_MIN_FRAMES {
        g *= 2;
    }
    while g > GAP_MAX_FRAMES {
        g = (g + 1) / 2;
    }
    if g <= GAP_MIN_FRAMES {
        g *= 2;
    }
    g
}

/// Tempo implied by a gap of `frames`, one gap per quarter beat
pub fn gap_to_bpm(frames: usize) -> f64 {
    60.0 / (frames as f64 * hop_duration() * GAP_PULSES_PER_BEAT)
}

/// Build the octave-compressed gap histogram (index = gap in frames)
pub fn gap_histogram(onset_frames: &[usize]) -> Vec<f64> {
    let mut histogram = vec![0.0f64; HISTOGRAM_LEN];

    for pair in onset_frames.windows(2) {
        let gap = pair[1].saturating_sub(pair[0]);
        if gap == 0 {
            continue;
        }
        let bin = if gap <= GAP_MIN_FRAMES || gap >= HISTOGRAM_LEN {
            fold_gap(gap)
        } else {
            gap
        };
        histogram[bin] += 1.0;
    }

    compress_octaves(&mut histogram);
    histogram
}

/// Fold tail energy down one octave at a time, from the top bin down
fn compress_octaves(histogram: &mut [f64]) {
    for bin in (GAP_MAX_FRAMES + 1..histogram.len()).rev() {
        let energy = histogram[bin];
        if energy > 0.0 {
            histogram[(bin + 1) / 2] += energy;
            histogram[bin] = 0.0;
        }
    }
}

/// Pick the centre of the dominant gap cluster
fn dominant_center(histogram: &[f64]) -> Option<(usize, f64)> {
    let half = (GAP_WINDOW_BINS / 2) as isize;
    let mut best: Option<(usize, f64)> = None;

    for center in (GAP_MIN_FRAMES + 1)..=GAP_MAX_FRAMES {
        let mut sum = 0.0;
        for k in -half..=half {
            let bin = center as isize + k;
            if bin < 0 || bin as usize >= histogram.len() {
                continue;
            }
            sum += histogram[bin as usize] / (1.0 + k.unsigned_abs() as f64);
        }
        match best {
            Some((_, best_sum)) if sum <= best_sum => {}
            _ => best = Some((center, sum)),
        }
    }

    best.filter(|(_, sum)| *sum > 0.0)
}

/// Estimate the ballpark BPM band and its candidate grid
///
/// # Arguments
///
/// * `onset_frames` - Ascending onset frame indices
///
/// # Errors
///
/// Returns `AnalysisError::InsufficientData` with fewer than 2 onsets or when
/// no non-zero gap exists.
pub fn estimate_ballpark(onset_frames: &[usize]) -> Result<GapEstimate, AnalysisError> {
    if onset_frames.len() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "Gap estimation needs at least 2 onsets, got {}",
            onset_frames.len()
        )));
    }

    let histogram = gap_histogram(onset_frames);
    let (center, weight) = dominant_center(&histogram).ok_or_else(|| {
        AnalysisError::InsufficientData("No usable inter-onset gaps".to_string())
    })?;

    let half = GAP_WINDOW_BINS / 2;
    let max_bpm = gap_to_bpm(center - half);
    let min_bpm = gap_to_bpm(center + half);

    let mut steps = if max_bpm > BPM_CEILING {
        let mut steps = bpm_steps(min_bpm, BPM_CEILING);
        steps.extend(bpm_steps(BPM_CEILING / 2.0, max_bpm / 2.0));
        steps
    } else {
        bpm_steps(min_bpm, max_bpm)
    };
    steps.sort_unstable();
    steps.dedup();

    log::debug!(
        "Gap ballpark: centre={} frames (weight {:.2}), band=[{:.2}, {:.2}] BPM, {} candidates",
        center,
        weight,
        min_bpm,
        max_bpm,
        steps.len()
    );

    Ok(GapEstimate {
        center_frames: center,
        min_bpm,
        max_bpm,
        candidates: steps.into_iter().map(step_to_bpm).collect(),
    })
}
