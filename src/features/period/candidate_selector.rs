//! Best-candidate selection by local contrast
//!
//! A true tempo stands out from its immediate neighbours on the candidate
//! grid: its match score jumps and its change score dips (or vice versa). For
//! both scores we compute the ratio of each value to the mean of up to two
//! neighbours on either side, inverted when below one, and multiply the two
//! ratios into a blended rank.
//!
//! - [`select_best_index`] returns the single highest-ranked candidate
//! - [`rank_for_cross_validation`] keeps candidates above
//!   `(max + mean) / 2` and returns up to three, best first

use std::cmp::Ordering;

use crate::config::CROSS_VALIDATION_CANDIDATES;
use crate::error::AnalysisError;

use super::TempoCandidate;

/// Floor for contrast ratios, keeps zero scores finite
const EPSILON: f64 = 1e-10;

/// Neighbours considered on each side
const NEIGHBOURS: usize = 2;

/// Local contrast of `values[index]` against its neighbourhood
///
/// Always ≥ 1. A candidate without neighbours has contrast 1.
pub fn contrast(values: &[f64], index: usize) -> f64 {
    let start = index.saturating_sub(NEIGHBOURS);
    let end = (index + NEIGHBOURS + 1).min(values.len());
    let neighbours: Vec<f64> = (start..end)
        .filter(|&j| j != index)
        .map(|j| values[j])
        .collect();

    if neighbours.is_empty() {
        return 1.0;
    }

    let average = neighbours.iter().sum::<f64>() / neighbours.len() as f64;
    let value = values[index];
    if value <= EPSILON && average <= EPSILON {
        return 1.0;
    }

    let ratio = value.max(EPSILON) / average.max(EPSILON);
    if ratio < 1.0 {
        1.0 / ratio
    } else {
        ratio
    }
}

/// Blend change-score and match-score contrast into one rank per candidate
///
/// Candidates must be ordered by ascending BPM. The rank is also written back
/// to each candidate's `contrast_rank`.
pub fn blended_ranks(candidates: &mut [TempoCandidate]) -> Vec<f64> {
    let changes: Vec<f64> = candidates.iter().map(|c| c.change_score).collect();
    let matches: Vec<f64> = candidates.iter().map(|c| c.match_score as f64).collect();

    let ranks: Vec<f64> = (0..candidates.len())
        .map(|i| contrast(&changes, i) * contrast(&matches, i))
        .collect();

    for (candidate, &rank) in candidates.iter_mut().zip(&ranks) {
        candidate.contrast_rank = rank;
    }
    ranks
}

fn argmax(ranks: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &rank) in ranks.iter().enumerate() {
        match best {
            Some(b) if rank <= ranks[b] => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Index of the candidate with the highest blended rank
///
/// Ties go to the lower BPM (first index).
pub fn select_best_index(candidates: &mut [TempoCandidate]) -> Result<usize, AnalysisError> {
    if candidates.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "No BPM candidates to select from".to_string(),
        ));
    }

    let ranks = blended_ranks(candidates);
    let best = argmax(&ranks).ok_or_else(|| {
        AnalysisError::ProcessingError("Blended ranks are not comparable".to_string())
    })?;

    log::debug!(
        "Best candidate: {:.1} BPM (rank {:.3}, match {}, change {:.4})",
        candidates[best].bpm,
        ranks[best],
        candidates[best].match_score,
        candidates[best].change_score
    );

    Ok(best)
}

/// Indices of up to three candidates for cross-validation, best first
///
/// Only candidates whose rank exceeds `(max + mean) / 2` survive. When none
/// does (a flat rank profile), the single best index is returned.
pub fn rank_for_cross_validation(
    candidates: &mut [TempoCandidate],
) -> Result<Vec<usize>, AnalysisError> {
    if candidates.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "No BPM candidates to rank".to_string(),
        ));
    }

    let ranks = blended_ranks(candidates);
    let max = ranks.iter().cloned().fold(f64::MIN, f64::max);
    let mean = ranks.iter().sum::<f64>() / ranks.len() as f64;
    let threshold = (max + mean) / 2.0;

    let mut survivors: Vec<usize> = (0..ranks.len()).filter(|&i| ranks[i] > threshold).collect();
    survivors.sort_by(|&a, &b| ranks[b].partial_cmp(&ranks[a]).unwrap_or(Ordering::Equal));
    survivors.truncate(CROSS_VALIDATION_CANDIDATES);

    if survivors.is_empty() {
        let best = argmax(&ranks).ok_or_else(|| {
            AnalysisError::ProcessingError("Blended ranks are not comparable".to_string())
        })?;
        survivors.push(best);
    }

    log::debug!(
        "Cross-validation candidates (threshold {:.3}): {:?}",
        threshold,
        survivors
            .iter()
            .map(|&i| format!("{:.1} BPM (rank {:.3})", candidates[i].bpm, ranks[i]))
            .collect::<Vec<_>>()
    );

    Ok(survivors)
}
