//! # Beatmap DSP
//!
//! Tempo, subdivision and beat-grid offset detection for rhythm-game charting
//! and DJ tooling.
//!
//! ## Features
//!
//! - **BPM Detection**: Inter-onset gap ballpark refined by per-candidate match/change scoring
//! - **Subdivision**: Triplet vs. sixteenth feel, with half-tempo correction
//! - **Offset**: Sub-hop phase search with onset lag compensation
//! - **Audio I/O**: Any format Symphonia decodes, resampled to 44.1 kHz
//!
//! ## Quick Start
//!
//! ```no_run
//! use beatmap_dsp::{detect, DetectRequest};
//! use std::path::Path;
//!
//! let detection = detect(&DetectRequest::from_path(Path::new("song.ogg")))?;
//!
//! println!("BPM: {:.1} ({} pulses per beat)", detection.bpm, detection.subdivision);
//! if let (Some(offset), Some(add)) = (detection.offset, detection.add) {
//!     println!("Offset: {:.4}s (prepend {:.4}s of silence)", offset, add);
//! }
//! # Ok::<(), beatmap_dsp::AnalysisError>(())
//! ```
//!
//! ## Architecture
//!
//! The detection pipeline follows this flow:
//!
//! ```text
//! Audio Input → Onsets → Gap Ballpark → Candidate Scoring → Selection
//!             → Subdivision → Offset → Detection
//! ```
//!
//! Every stage is also usable on its own through [`features`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod features;
pub mod io;

// Re-export main types
pub use analysis::detector::{AudioInput, DetectRequest, TempoDetector};
pub use analysis::result::{Detection, DetectionFlag, DetectionMetadata};
pub use config::{CandidateSource, DetectorConfig, SelectionMode};
pub use error::AnalysisError;
pub use features::beat_tracking::BeatGrid;
pub use features::onset::OnsetData;

/// Main detection function
///
/// Runs a request through a [`TempoDetector`] with the default configuration,
/// spectral-flux onset extractor and Symphonia loader.
///
/// # Arguments
///
/// * `request` - Audio source plus optional known BPM/subdivision and output flags
///
/// # Returns
///
/// `Detection` containing BPM, subdivision and, when requested, offset and `add`
///
/// # Errors
///
/// Returns `AnalysisError` on a malformed request (no input, wrong sample
/// rate, known BPM with offset detection disabled), too few onsets, or an
/// undecodable file
///
/// # Example
///
/// ```no_run
/// use beatmap_dsp::{detect, DetectRequest};
///
/// let samples = vec![0.0f32; 44100 * 30];
/// let detection = detect(&DetectRequest::from_signal(&samples, 44100).with_bpm(128.0))?;
/// println!("offset {:?}", detection.offset);
/// # Ok::<(), beatmap_dsp::AnalysisError>(())
/// ```
pub fn detect(request: &DetectRequest<'_>) -> Result<Detection, AnalysisError> {
    let detector: TempoDetector = TempoDetector::default();
    detector.detect(request)
}
