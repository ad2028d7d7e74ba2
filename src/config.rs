//! Configuration parameters for BPM/offset detection
//!
//! The analysis constants below are fixed: every heuristic threshold in the
//! pipeline was fitted against them, so they are not exposed as settings.
//! Only the knobs in [`DetectorConfig`] are tunable.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Sample rate every signal is analysed at (Hz)
pub const SAMPLE_RATE: u32 = 44100;

/// Samples between consecutive onset-envelope frames
pub const HOP_SIZE: usize = 512;

/// Spacing of the BPM candidate grid
pub const BPM_PRECISION: f64 = 0.5;

/// Lower bound of the folded gap band, in frames (exclusive)
pub const GAP_MIN_FRAMES: usize = 7;

/// Upper bound of the folded gap band, in frames (inclusive)
pub const GAP_MAX_FRAMES: usize = 2 * GAP_MIN_FRAMES;

/// Width of the weighted window slid over the gap histogram
pub const GAP_WINDOW_BINS: usize = 5;

/// Pulses per beat assumed when converting a gap to a tempo
pub const GAP_PULSES_PER_BEAT: f64 = 4.0;

/// Hard tempo ceiling; bands above it are split and halved
pub const BPM_CEILING: f64 = 200.0;

/// Lowest tempo of the fixed candidate range (`CandidateSource::FixedRange`).
/// The range spans one octave: `[SIMPLE_MIN_BPM, 2 * SIMPLE_MIN_BPM)`.
pub const SIMPLE_MIN_BPM: f64 = 90.0;

/// Number of phases scanned per beat period when locating the offset
pub const OFFSET_PHASE_STEPS: usize = 128;

/// Onset detectors report attacks late; the offset is pulled forward by this many hops
pub const LAG_COMPENSATION_HOPS: f64 = 1.25;

/// Relative asymmetry between the half-beat bins above which the tempo is doubled
pub const HALVING_THRESHOLD: f64 = 0.75;

/// Floor applied to subdivision scores to keep ratios finite
pub const SUBDIVISION_SCORE_FLOOR: f64 = 0.1;

/// Maximum number of ranked candidates tried during cross-validation
pub const CROSS_VALIDATION_CANDIDATES: usize = 3;

/// Duration of one hop in seconds
pub fn hop_duration() -> f64 {
    HOP_SIZE as f64 / SAMPLE_RATE as f64
}

/// Convert an onset-envelope frame index to seconds
pub fn frame_to_seconds(frame: usize) -> f64 {
    frame as f64 * hop_duration()
}

/// How the final BPM is chosen from the scored candidate grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Highest blended contrast wins outright
    Simple,
    /// Top-ranked candidates are cross-validated against the subdivision classifier
    CrossValidated,
}

/// Where the BPM candidate grid comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateSource {
    /// Ballpark band derived from inter-onset gaps
    GapEstimate,
    /// One fixed octave starting at [`SIMPLE_MIN_BPM`]
    FixedRange,
}

/// Tunable detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Number of phase checkpoints per beat for the match score (default: 16).
    /// Detection time grows linearly with this value.
    pub match_score_checks: usize,

    /// Candidate selection strategy (default: CrossValidated)
    pub selection: SelectionMode,

    /// Candidate grid source (default: GapEstimate)
    pub candidate_source: CandidateSource,

    /// Score candidates on the rayon thread pool (default: true)
    pub parallel_scoring: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            match_score_checks: 16,
            selection: SelectionMode::CrossValidated,
            candidate_source: CandidateSource::GapEstimate,
            parallel_scoring: true,
        }
    }
}

impl DetectorConfig {
    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.match_score_checks == 0 {
            return Err(AnalysisError::InvalidInput(
                "match_score_checks must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
