//! Period estimation modules
//!
//! Convert an onset list to a BPM estimate:
//! - Gap histogram ballpark (candidate grid)
//! - Match/change scoring per candidate
//! - Local-contrast candidate selection

pub mod candidate_scorer;
pub mod candidate_selector;
pub mod gap_estimator;

use serde::{Deserialize, Serialize};

use crate::config::BPM_PRECISION;

/// BPM candidate with its scores against the onset set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoCandidate {
    /// Candidate tempo
    pub bpm: f64,

    /// Number of onsets aligned to the best phase checkpoint
    pub match_score: u32,

    /// Average change of consecutive phase residuals, scaled by BPM
    pub change_score: f64,

    /// Phase (seconds, in `[0, 60/bpm)`) that achieved the match score
    pub phase_offset: f64,

    /// Blended local contrast (≥ 1, higher = more distinctive); 0 until ranked
    pub contrast_rank: f64,
}

/// Beat period in seconds
pub fn beat_period(bpm: f64) -> f64 {
    60.0 / bpm
}

/// Fold a signed time difference into `(-period/2, period/2]`
///
/// Used for every onset-to-grid distance in the pipeline. Idempotent.
pub fn wrap_residual(delta: f64, period: f64) -> f64 {
    let r = delta.rem_euclid(period);
    if r > period / 2.0 {
        r - period
    } else {
        r
    }
}

/// Candidate grid at [`BPM_PRECISION`] steps covering `[min_bpm, max_bpm)`
///
/// Steps are aligned to multiples of the precision so grids built from
/// different bands can be merged without near-duplicates.
pub fn bpm_steps(min_bpm: f64, max_bpm: f64) -> Vec<u32> {
    if !(min_bpm.is_finite() && max_bpm.is_finite()) || max_bpm <= min_bpm {
        return Vec::new();
    }
    let first = (min_bpm / BPM_PRECISION).ceil().max(1.0) as u32;
    let end = (max_bpm / BPM_PRECISION).ceil() as u32;
    (first..end).collect()
}

/// Convert a grid step back to BPM
pub fn step_to_bpm(step: u32) -> f64 {
    step as f64 * BPM_PRECISION
}
