//! Onset extraction modules
//!
//! Turns a mono signal into the observation data of the tempo pipeline:
//! - Onset-strength envelope (mel spectral flux)
//! - Onset frames (adaptive peak picking on the envelope)
//!
//! Extraction sits behind the [`OnsetExtractor`] trait so callers can plug in
//! their own detector, or bypass extraction entirely with precomputed
//! [`OnsetData`].

pub mod peak_picking;
pub mod strength;

use crate::config::frame_to_seconds;
use crate::error::AnalysisError;

pub use peak_picking::PeakPickConfig;
pub use strength::SpectralFluxExtractor;

/// Onset frames plus the strength envelope they were picked from
///
/// Frames are strictly increasing indices into the envelope; envelope values
/// are finite and non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct OnsetData {
    frames: Vec<usize>,
    envelope: Vec<f32>,
}

impl OnsetData {
    /// Validate and wrap onset frames and their envelope
    ///
    /// # Errors
    ///
    /// `InvalidInput` when frames are not strictly increasing, point outside
    /// the envelope, or the envelope holds negative/non-finite values.
    pub fn new(frames: Vec<usize>, envelope: Vec<f32>) -> Result<Self, AnalysisError> {
        if let Some(pair) = frames.windows(2).find(|w| w[1] <= w[0]) {
            return Err(AnalysisError::InvalidInput(format!(
                "Onset frames must be strictly increasing ({} followed by {})",
                pair[0], pair[1]
            )));
        }
        if let Some(&last) = frames.last() {
            if last >= envelope.len() {
                return Err(AnalysisError::InvalidInput(format!(
                    "Onset frame {} outside envelope of {} frames",
                    last,
                    envelope.len()
                )));
            }
        }
        if let Some(value) = envelope.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "Onset envelope contains invalid value {}",
                value
            )));
        }
        Ok(Self { frames, envelope })
    }

    /// Onset frame indices
    pub fn frames(&self) -> &[usize] {
        &self.frames
    }

    /// Onset-strength envelope, one value per hop
    pub fn envelope(&self) -> &[f32] {
        &self.envelope
    }

    /// Onset times in seconds
    pub fn times(&self) -> Vec<f64> {
        self.frames.iter().map(|&f| frame_to_seconds(f)).collect()
    }

    /// Number of onsets
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when no onset was detected
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Source of onset data for a mono signal
pub trait OnsetExtractor {
    /// Extract onset frames and the onset-strength envelope
    ///
    /// `samples` are mono, at `sample_rate` Hz; frames are `HOP_SIZE` samples apart.
    fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<OnsetData, AnalysisError>;
}
