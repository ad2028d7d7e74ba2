//! Beat grid offset search
//!
//! Finds the phase of the beat grid for a known BPM.
//!
//! # Algorithm
//!
//! 1. Scan `OFFSET_PHASE_STEPS` (128) evenly spaced phases across one beat
//! 2. For each phase, count onsets within one hop of it (wrapped distance)
//!    and accumulate their signed residuals
//! 3. Take the phase with the most matches (first on ties) and move it by the
//!    mean residual of its matches for sub-hop precision
//! 4. Wrap into `[0, period)`, then subtract `1.25` hops to compensate for
//!    onset detector lag
//! 5. Normalise into `(-period/2, period/2]`
//!
//! The result is a [`BeatGrid`]; [`BeatGrid::add`] gives the silence to
//! prepend for a zero offset.

use crate::config::{hop_duration, LAG_COMPENSATION_HOPS, OFFSET_PHASE_STEPS};
use crate::error::AnalysisError;
use crate::features::period::{beat_period, wrap_residual};

use super::BeatGrid;

/// Per-phase match statistics of the dense phase scan
#[derive(Debug, Clone)]
pub struct PhaseScan {
    /// Matched onset count per phase bucket
    pub counts: [u32; OFFSET_PHASE_STEPS],

    /// Sum of matched signed residuals per phase bucket
    pub residual_sums: [f64; OFFSET_PHASE_STEPS],

    /// Spacing between phase buckets (seconds)
    pub step: f64,
}

impl PhaseScan {
    /// Bucket with the most matches, first on ties
    pub fn best_bucket(&self) -> usize {
        let mut best = 0;
        for (i, &count) in self.counts.iter().enumerate() {
            if count > self.counts[best] {
                best = i;
            }
        }
        best
    }

    /// Phase of bucket `i` refined by its mean matched residual
    pub fn refined_phase(&self, i: usize) -> Option<f64> {
        if self.counts[i] == 0 {
            return None;
        }
        Some(self.step * i as f64 + self.residual_sums[i] / self.counts[i] as f64)
    }
}

/// Scan all candidate phases for one beat period
pub fn scan_phases(times: &[f64], bpm: f64) -> PhaseScan {
    let period = beat_period(bpm);
    let step = period / OFFSET_PHASE_STEPS as f64;
    let tolerance = hop_duration();

    let mut counts = [0u32; OFFSET_PHASE_STEPS];
    let mut residual_sums = [0.0f64; OFFSET_PHASE_STEPS];

    for bucket in 0..OFFSET_PHASE_STEPS {
        let phase = step * bucket as f64;
        for &t in times {
            let delta = wrap_residual(t - phase, period);
            if delta.abs() < tolerance {
                counts[bucket] += 1;
                residual_sums[bucket] += delta;
            }
        }
    }

    PhaseScan {
        counts,
        residual_sums,
        step,
    }
}

/// Find the beat grid offset for a fixed BPM
///
/// # Arguments
///
/// * `times` - Onset times in seconds
/// * `bpm` - Final tempo
///
/// # Errors
///
/// `InsufficientData` without onsets (or when no onset matches any phase),
/// `InvalidInput` for a non-positive BPM.
pub fn find_offset(times: &[f64], bpm: f64) -> Result<BeatGrid, AnalysisError> {
    if times.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "Offset search needs at least one onset".to_string(),
        ));
    }
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(AnalysisError::InvalidInput(format!("Invalid BPM: {}", bpm)));
    }

    let period = beat_period(bpm);
    let scan = scan_phases(times, bpm);
    let best = scan.best_bucket();
    let refined = scan.refined_phase(best).ok_or_else(|| {
        AnalysisError::InsufficientData(format!("No onset matched any phase at {:.1} BPM", bpm))
    })?;

    let lag = hop_duration() * LAG_COMPENSATION_HOPS;
    let phase = refined.rem_euclid(period) - lag;
    let grid = BeatGrid::new(bpm, phase);

    log::debug!(
        "Offset at {:.2} BPM: bucket {} ({} matches), refined {:.4}s, offset {:.4}s, add {:.4}s",
        bpm,
        best,
        scan.counts[best],
        refined,
        grid.offset,
        grid.add()
    );

    Ok(grid)
}
