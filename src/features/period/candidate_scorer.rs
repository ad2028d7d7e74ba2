//! Per-candidate BPM scoring
//!
//! Every candidate tempo is scored against the full onset set with two
//! complementary measures:
//!
//! - **match score**: the number of onsets that land within one checkpoint
//!   width of the best of `match_score_checks` evenly spaced phases
//! - **change score**: the mean absolute change between consecutive onsets'
//!   distances to that phase, scaled by the BPM
//!
//! A true tempo produces a sharp match count and coherent residuals; both
//! measures change abruptly around it on the candidate grid, which is what
//! the selector looks for.
//!
//! Candidates are independent, so scoring runs on the rayon pool when
//! requested. Results are collected in candidate order either way.

use rayon::prelude::*;

use crate::error::AnalysisError;

use super::{beat_period, wrap_residual, TempoCandidate};

/// Count the onsets aligned to the best phase checkpoint
///
/// # Arguments
///
/// * `times` - Onset times in seconds
/// * `bpm` - Candidate tempo
/// * `checks` - Number of phase checkpoints across one beat period
///
/// # Returns
///
/// `(count, phase)` where `phase` is the first checkpoint reaching the maximum
pub fn match_score(times: &[f64], bpm: f64, checks: usize) -> (u32, f64) {
    let period = beat_period(bpm);
    let width = period / checks as f64;

    let mut best_count = 0u32;
    let mut best_phase = 0.0;
    for checkpoint in 0..checks {
        let phase = width * checkpoint as f64;
        let count = times
            .iter()
            .filter(|&&t| wrap_residual(t - phase, period).abs() < width)
            .count() as u32;
        if count > best_count {
            best_count = count;
            best_phase = phase;
        }
    }

    (best_count, best_phase)
}

/// Centre a checkpoint phase on the onsets it matched
///
/// A checkpoint phase can sit up to half a checkpoint width away from the
/// pulse it matched. The mean wrapped residual of the onsets within one width
/// of `phase` moves it onto that pulse, without jumping to another one.
///
/// # Returns
///
/// The refined phase in `[0, period)`, or `phase` unchanged when no onset
/// lies within one width of it
pub fn aligned_phase(times: &[f64], bpm: f64, phase: f64, checks: usize) -> f64 {
    let period = beat_period(bpm);
    let width = period / checks.max(1) as f64;

    let (sum, count) = times
        .iter()
        .map(|&t| wrap_residual(t - phase, period))
        .filter(|residual| residual.abs() < width)
        .fold((0.0, 0usize), |(sum, count), residual| (sum + residual, count + 1));
    if count == 0 {
        return phase;
    }

    (phase + sum / count as f64).rem_euclid(period)
}

/// Average change of consecutive onset distances to `phase`, times BPM
///
/// Requires at least two onsets; returns 0.0 otherwise.
pub fn change_score(times: &[f64], bpm: f64, phase: f64) -> f64 {
    if times.len() < 2 {
        return 0.0;
    }
    let period = beat_period(bpm);
    let distances: Vec<f64> = times
        .iter()
        .map(|&t| wrap_residual(t - phase, period).abs())
        .collect();

    let total: f64 = distances.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    total / (distances.len() - 1) as f64 * bpm
}

/// Score a single candidate
pub fn score_candidate(
    times: &[f64],
    bpm: f64,
    checks: usize,
) -> Result<TempoCandidate, AnalysisError> {
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(AnalysisError::InvalidInput(format!(
            "Invalid candidate BPM: {}",
            bpm
        )));
    }
    let (matched, phase) = match_score(times, bpm, checks);
    let change = change_score(times, bpm, phase);
    if !change.is_finite() {
        return Err(AnalysisError::ProcessingError(format!(
            "Non-finite change score at {:.1} BPM",
            bpm
        )));
    }

    Ok(TempoCandidate {
        bpm,
        match_score: matched,
        change_score: change,
        phase_offset: phase,
        contrast_rank: 0.0,
    })
}

/// Score every candidate BPM against the onset times
///
/// # Arguments
///
/// * `times` - Onset times in seconds (ascending)
/// * `bpms` - Candidate grid, ascending
/// * `checks` - Phase checkpoints per beat
/// * `parallel` - Score candidates on the rayon pool
///
/// # Returns
///
/// One `TempoCandidate` per input BPM, in input order
///
/// # Errors
///
/// `InsufficientData` with fewer than 2 onsets or no candidates,
/// `InvalidInput` for `checks == 0` or a non-positive BPM
pub fn score_candidates(
    times: &[f64],
    bpms: &[f64],
    checks: usize,
    parallel: bool,
) -> Result<Vec<TempoCandidate>, AnalysisError> {
    if times.len() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "Candidate scoring needs at least 2 onsets, got {}",
            times.len()
        )));
    }
    if bpms.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "Empty BPM candidate grid".to_string(),
        ));
    }
    if checks == 0 {
        return Err(AnalysisError::InvalidInput(
            "Match score needs at least one checkpoint".to_string(),
        ));
    }

    log::debug!(
        "Scoring {} BPM candidates [{:.1}..{:.1}] against {} onsets ({} checks, parallel={})",
        bpms.len(),
        bpms[0],
        bpms[bpms.len() - 1],
        times.len(),
        checks,
        parallel
    );

    if parallel {
        bpms.par_iter()
            .map(|&bpm| score_candidate(times, bpm, checks))
            .collect()
    } else {
        bpms.iter()
            .map(|&bpm| score_candidate(times, bpm, checks))
            .collect()
    }
}
