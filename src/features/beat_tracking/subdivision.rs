//! Beat subdivision classification
//!
//! Decides whether a beat divides into 3 or 4 pulses, and whether the
//! candidate tempo is really half of the true pulse rate.
//!
//! # Algorithm
//!
//! 1. Build a 3-bin and a 4-bin energy histogram over one beat period: every
//!    onset within one hop of a subdivision boundary (after removing the grid
//!    offset) adds its onset-strength value to that boundary's bin
//! 2. `score3 = max(mean(bin3[1], bin3[2]), 0.1)`
//! 3. `score4 = bin4[2]` (the off-beat "and"), `sides = mean(bin4[1], bin4[3])`
//! 4. Halving is flagged when `|score4 - sides| / max(score4, sides, 0.1) > 0.75`
//! 5. Triplet feel wins when `score3 / (score3 + score4) > 0.5`
//!
//! # Example
//!
//! ```
//! use beatmap_dsp::features::beat_tracking::subdivision::classify_subdivision;
//!
//! // Onsets on every eighth note at 120 BPM (frames at 44.1 kHz / hop 512)
//! let frames: Vec<usize> = (0..32).map(|i| (i as f64 * 0.25 / (512.0 / 44100.0)).round() as usize).collect();
//! let envelope = vec![1.0f32; frames[frames.len() - 1] + 1];
//! let result = classify_subdivision(&frames, &envelope, 120.0, 0.0)?.unwrap();
//! assert_eq!(result.subdivision, 4);
//! assert!(result.needs_halving);
//! # Ok::<(), beatmap_dsp::AnalysisError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{frame_to_seconds, hop_duration, HALVING_THRESHOLD, SUBDIVISION_SCORE_FLOOR};
use crate::error::AnalysisError;
use crate::features::period::beat_period;

/// Outcome of subdivision classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdivisionResult {
    /// Pulses per beat: 3 or 4
    pub subdivision: u32,

    /// The candidate BPM is half the true tempo (beat period should be halved)
    pub needs_halving: bool,
}

/// Energy histogram of onsets aligned to an `bins`-way division of the beat
///
/// # Arguments
///
/// * `onset_frames` - Onset frame indices
/// * `envelope` - Onset-strength envelope, indexed by frame
/// * `bpm` - Beat tempo
/// * `offset` - Grid phase in seconds
/// * `bins` - Subdivisions per beat
pub fn subdivision_histogram(
    onset_frames: &[usize],
    envelope: &[f32],
    bpm: f64,
    offset: f64,
    bins: usize,
) -> Vec<f64> {
    let mut histogram = vec![0.0f64; bins];
    if bins == 0 {
        return histogram;
    }
    let width = beat_period(bpm) / bins as f64;
    let tolerance = hop_duration();

    for &frame in onset_frames {
        let Some(&strength) = envelope.get(frame) else {
            continue;
        };
        let position = (frame_to_seconds(frame) - offset) / width;
        let nearest = position.round();
        if (position - nearest).abs() * width <= tolerance {
            let bin = (nearest as i64).rem_euclid(bins as i64) as usize;
            histogram[bin] += strength as f64;
        }
    }

    histogram
}

/// Classify the beat subdivision for a fixed tempo and phase
///
/// # Returns
///
/// `Ok(None)` when no onset energy lands on any subdivision boundary, which
/// makes the candidate unusable for cross-validation.
///
/// Onsets on the beat alone leave every off-beat bin empty, and such a grid
/// classifies as 3. Callers analysing plain quarter-note material should pass
/// a known subdivision instead of relying on this result.
///
/// # Errors
///
/// `InsufficientData` for an empty onset list or envelope, `InvalidInput` for
/// a non-positive BPM or an onset frame outside the envelope.
pub fn classify_subdivision(
    onset_frames: &[usize],
    envelope: &[f32],
    bpm: f64,
    offset: f64,
) -> Result<Option<SubdivisionResult>, AnalysisError> {
    if onset_frames.is_empty() || envelope.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "Subdivision classification needs onsets and an onset envelope".to_string(),
        ));
    }
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(AnalysisError::InvalidInput(format!("Invalid BPM: {}", bpm)));
    }
    if let Some(&frame) = onset_frames.iter().find(|&&f| f >= envelope.len()) {
        return Err(AnalysisError::InvalidInput(format!(
            "Onset frame {} outside envelope of {} frames",
            frame,
            envelope.len()
        )));
    }

    let bins3 = subdivision_histogram(onset_frames, envelope, bpm, offset, 3);
    let bins4 = subdivision_histogram(onset_frames, envelope, bpm, offset, 4);

    let total: f64 = bins3.iter().chain(bins4.iter()).sum();
    if total <= 0.0 {
        log::debug!("No onset energy on the subdivision grid at {:.1} BPM", bpm);
        return Ok(None);
    }

    let score3 = ((bins3[1] + bins3[2]) / 2.0).max(SUBDIVISION_SCORE_FLOOR);
    let score4 = bins4[2];
    let sides4 = (bins4[1] + bins4[3]) / 2.0;
    let asymmetry =
        (score4 - sides4).abs() / score4.max(sides4).max(SUBDIVISION_SCORE_FLOOR);

    let probability3 = score3 / (score3 + score4);

    log::debug!(
        "Subdivision at {:.1} BPM: bins3={:?} bins4={:?} p3={:.3} asymmetry={:.3}",
        bpm,
        bins3,
        bins4,
        probability3,
        asymmetry
    );

    let result = if probability3 > 0.5 {
        SubdivisionResult {
            subdivision: 3,
            needs_halving: false,
        }
    } else {
        SubdivisionResult {
            subdivision: 4,
            needs_halving: asymmetry > HALVING_THRESHOLD,
        }
    };

    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frames for onsets at `phase + k * period / pulses`, with a per-pulse strength
    fn pulse_train(bpm: f64, pulses: usize, beats: usize, strengths: &[f32]) -> (Vec<usize>, Vec<f32>) {
        let period = 60.0 / bpm;
        let mut frames = Vec::new();
        let mut values = Vec::new();
        for beat in 0..beats {
            for pulse in 0..pulses {
                let strength = strengths[pulse % strengths.len()];
                if strength <= 0.0 {
                    continue;
                }
                let t = beat as f64 * period + pulse as f64 * period / pulses as f64;
                frames.push((t / hop_duration()).round() as usize);
                values.push(strength);
            }
        }
        let mut envelope = vec![0.0f32; frames[frames.len() - 1] + 8];
        for (&frame, &value) in frames.iter().zip(&values) {
            envelope[frame] = value;
        }
        (frames, envelope)
    }

    #[test]
    fn test_half_beat_pattern_needs_halving() {
        let (frames, envelope) = pulse_train(120.0, 4, 16, &[1.0, 0.0, 1.0, 0.0]);
        let result = classify_subdivision(&frames, &envelope, 120.0, 0.0)
            .unwrap()
            .unwrap();
        assert_eq!(result.subdivision, 4);
        assert!(result.needs_halving);
    }

    #[test]
    fn test_even_sixteenths_no_halving() {
        let (frames, envelope) = pulse_train(120.0, 4, 16, &[1.0, 0.8, 0.9, 0.8]);
        let result = classify_subdivision(&frames, &envelope, 120.0, 0.0)
            .unwrap()
            .unwrap();
        assert_eq!(result.subdivision, 4);
        assert!(!result.needs_halving);
    }

    #[test]
    fn test_triplets_classified_as_three() {
        let (frames, envelope) = pulse_train(100.0, 3, 16, &[1.0, 0.7, 0.7]);
        let result = classify_subdivision(&frames, &envelope, 100.0, 0.0)
            .unwrap()
            .unwrap();
        assert_eq!(result.subdivision, 3);
        assert!(!result.needs_halving);
    }

    #[test]
    fn test_beats_only_classified_as_three() {
        let (frames, envelope) = pulse_train(120.0, 1, 16, &[1.0]);
        let result = classify_subdivision(&frames, &envelope, 120.0, 0.0)
            .unwrap()
            .unwrap();
        assert_eq!(result.subdivision, 3);
        assert!(!result.needs_halving);
    }

    #[test]
    fn test_histogram_respects_offset() {
        let (frames, envelope) = pulse_train(120.0, 1, 8, &[1.0]);
        // Grid shifted by a quarter period: beats land on bin 3 of 4
        let bins = subdivision_histogram(&frames, &envelope, 120.0, 0.125, 4);
        assert!(bins[3] > 0.0);
        assert_eq!(bins[0], 0.0);
    }

    #[test]
    fn test_no_energy_is_none() {
        let (frames, _) = pulse_train(120.0, 4, 4, &[1.0]);
        let envelope = vec![0.0f32; frames[frames.len() - 1] + 1];
        assert_eq!(
            classify_subdivision(&frames, &envelope, 120.0, 0.0).unwrap(),
            None
        );
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            classify_subdivision(&[], &[1.0], 120.0, 0.0),
            Err(AnalysisError::InsufficientData(_))
        ));
        assert!(matches!(
            classify_subdivision(&[1, 5], &[1.0; 3], 120.0, 0.0),
            Err(AnalysisError::InvalidInput(_))
        ));
        assert!(matches!(
            classify_subdivision(&[1], &[1.0; 3], -5.0, 0.0),
            Err(AnalysisError::InvalidInput(_))
        ));
    }
}
