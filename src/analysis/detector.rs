//! Detection orchestrator
//!
//! Sequences the pipeline stages into a single detection pass:
//!
//! 1. **Onsets**: load and extract (or take precomputed onset data)
//! 2. **BPM**: gap ballpark → candidate scoring → contrast selection, optionally
//!    cross-validated against the subdivision classifier
//! 3. **Subdivision**: classify at the final BPM unless supplied or already
//!    known from cross-validation; apply tempo doubling when the classifier
//!    reports a half-tempo candidate
//! 4. **Offset**: full-precision phase search at the final BPM
//!
//! # Example
//!
//! ```no_run
//! use beatmap_dsp::analysis::detector::{DetectRequest, TempoDetector};
//! use beatmap_dsp::DetectorConfig;
//! use std::path::Path;
//!
//! let detector = TempoDetector::new(DetectorConfig::default())?;
//! let request = DetectRequest::from_path(Path::new("track.flac"));
//! let detection = detector.detect(&request)?;
//! println!("{:.1} BPM, offset {:?}", detection.bpm, detection.offset);
//! # Ok::<(), beatmap_dsp::AnalysisError>(())
//! ```

use std::borrow::Cow;
use std::path::Path;
use std::time::Instant;

use crate::analysis::result::{Detection, DetectionFlag, DetectionMetadata};
use crate::config::{
    CandidateSource, DetectorConfig, SelectionMode, BPM_CEILING, SAMPLE_RATE, SIMPLE_MIN_BPM,
};
use crate::error::AnalysisError;
use crate::features::beat_tracking::offset::find_offset;
use crate::features::beat_tracking::subdivision::{classify_subdivision, SubdivisionResult};
use crate::features::onset::{OnsetData, OnsetExtractor, SpectralFluxExtractor};
use crate::features::period::candidate_scorer::{aligned_phase, match_score, score_candidates};
use crate::features::period::candidate_selector::{rank_for_cross_validation, select_best_index};
use crate::features::period::gap_estimator::estimate_ballpark;
use crate::features::period::{bpm_steps, step_to_bpm};
use crate::io::{AudioLoader, SymphoniaLoader};

/// Audio handed to the detector
#[derive(Debug, Clone, Copy)]
pub enum AudioInput<'a> {
    /// Audio file, decoded and resampled by the detector's loader
    Path(&'a Path),

    /// Mono signal; `sample_rate` must equal [`SAMPLE_RATE`]
    Signal {
        /// Mono samples
        samples: &'a [f32],
        /// Sample rate in Hz
        sample_rate: u32,
    },

    /// Precomputed onsets, bypassing loading and extraction
    Onsets(&'a OnsetData),
}

/// One detection request
///
/// `detect_offset` and `detect_time_scale` default to `true`.
#[derive(Debug, Clone, Copy)]
pub struct DetectRequest<'a> {
    /// Audio source; `None` is rejected
    pub input: Option<AudioInput<'a>>,

    /// Caller-supplied tempo; skips BPM estimation
    pub known_bpm: Option<f64>,

    /// Caller-supplied pulses per beat (3 or 4); skips classification
    pub known_subdivision: Option<u32>,

    /// Locate the beat grid offset
    pub detect_offset: bool,

    /// Classify the subdivision (and correct half-tempo estimates)
    pub detect_time_scale: bool,
}

impl Default for DetectRequest<'_> {
    fn default() -> Self {
        Self {
            input: None,
            known_bpm: None,
            known_subdivision: None,
            detect_offset: true,
            detect_time_scale: true,
        }
    }
}

impl<'a> DetectRequest<'a> {
    /// Request for an audio file
    pub fn from_path(path: &'a Path) -> Self {
        Self {
            input: Some(AudioInput::Path(path)),
            ..Self::default()
        }
    }

    /// Request for an in-memory mono signal
    pub fn from_signal(samples: &'a [f32], sample_rate: u32) -> Self {
        Self {
            input: Some(AudioInput::Signal {
                samples,
                sample_rate,
            }),
            ..Self::default()
        }
    }

    /// Request for precomputed onsets
    pub fn from_onsets(onsets: &'a OnsetData) -> Self {
        Self {
            input: Some(AudioInput::Onsets(onsets)),
            ..Self::default()
        }
    }

    /// Use a known tempo instead of estimating it
    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.known_bpm = Some(bpm);
        self
    }

    /// Use a known subdivision instead of classifying it
    pub fn with_subdivision(mut self, subdivision: u32) -> Self {
        self.known_subdivision = Some(subdivision);
        self
    }

    /// Enable or disable the offset search
    pub fn with_offset(mut self, detect_offset: bool) -> Self {
        self.detect_offset = detect_offset;
        self
    }

    /// Enable or disable subdivision classification
    pub fn with_time_scale(mut self, detect_time_scale: bool) -> Self {
        self.detect_time_scale = detect_time_scale;
        self
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        let input = self.input.as_ref().ok_or_else(|| {
            AnalysisError::InvalidInput("No audio path, signal, or onset data supplied".to_string())
        })?;

        if self.known_bpm.is_some() && !self.detect_offset {
            return Err(AnalysisError::InvalidInput(
                "A known BPM with offset detection disabled leaves nothing to detect".to_string(),
            ));
        }

        if let AudioInput::Signal { sample_rate, .. } = input {
            if *sample_rate != SAMPLE_RATE {
                return Err(AnalysisError::InvalidInput(format!(
                    "Signal must be sampled at {} Hz, got {} Hz",
                    SAMPLE_RATE, sample_rate
                )));
            }
        }

        if let Some(bpm) = self.known_bpm {
            if !(bpm.is_finite() && bpm > 0.0) {
                return Err(AnalysisError::InvalidInput(format!("Invalid BPM: {}", bpm)));
            }
        }

        if let Some(subdivision) = self.known_subdivision {
            if subdivision != 3 && subdivision != 4 {
                return Err(AnalysisError::InvalidInput(format!(
                    "Subdivision must be 3 or 4, got {}",
                    subdivision
                )));
            }
        }

        Ok(())
    }
}

/// Winning candidate from BPM estimation
#[derive(Debug, Clone, Copy)]
struct TempoEstimate {
    bpm: f64,
    phase_offset: f64,
    /// Subdivision found during cross-validation
    subdivision: Option<SubdivisionResult>,
}

/// BPM, subdivision and offset detector
///
/// Holds a frozen [`DetectorConfig`] plus the onset extractor and audio
/// loader collaborators. Stateless across calls.
#[derive(Debug, Clone)]
pub struct TempoDetector<E = SpectralFluxExtractor, L = SymphoniaLoader> {
    config: DetectorConfig,
    extractor: E,
    loader: L,
}

impl TempoDetector {
    /// Detector with the default spectral-flux extractor and Symphonia loader
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the configuration is rejected by [`DetectorConfig::validate`]
    pub fn new(config: DetectorConfig) -> Result<Self, AnalysisError> {
        Self::with_components(config, SpectralFluxExtractor::default(), SymphoniaLoader)
    }
}

impl Default for TempoDetector {
    fn default() -> Self {
        Self {
            config: DetectorConfig::default(),
            extractor: SpectralFluxExtractor::default(),
            loader: SymphoniaLoader,
        }
    }
}

impl<E: OnsetExtractor, L: AudioLoader> TempoDetector<E, L> {
    /// Detector with custom collaborators
    pub fn with_components(
        config: DetectorConfig,
        extractor: E,
        loader: L,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            config,
            extractor,
            loader,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run a detection request
    ///
    /// # Returns
    ///
    /// `Detection` with the BPM and subdivision, plus offset and `add` when
    /// `detect_offset` is set
    ///
    /// # Errors
    ///
    /// - `InvalidInput`: no input, wrong sample rate, a known BPM with offset
    ///   detection disabled, or an invalid known BPM/subdivision
    /// - `InsufficientData`: fewer than 2 onsets
    /// - `DecodingError`: the audio file could not be loaded
    pub fn detect(&self, request: &DetectRequest<'_>) -> Result<Detection, AnalysisError> {
        let start_time = Instant::now();
        request.validate()?;

        let input = request.input.as_ref().ok_or_else(|| {
            AnalysisError::InvalidInput("No audio input supplied".to_string())
        })?;
        let onsets = self.onsets(input)?;
        if onsets.len() < 2 {
            return Err(AnalysisError::InsufficientData(format!(
                "Detection needs at least 2 onsets, got {}",
                onsets.len()
            )));
        }

        let times = onsets.times();
        let mut metadata = DetectionMetadata {
            onset_count: onsets.len(),
            ..DetectionMetadata::default()
        };

        log::debug!(
            "Detecting: {} onsets, known bpm {:?}, known subdivision {:?}, offset={}, time scale={}",
            onsets.len(),
            request.known_bpm,
            request.known_subdivision,
            request.detect_offset,
            request.detect_time_scale
        );

        // NeedBPM
        let estimate = match request.known_bpm {
            Some(bpm) => {
                let checks = self.config.match_score_checks;
                let (_, phase) = match_score(&times, bpm, checks);
                TempoEstimate {
                    bpm,
                    phase_offset: aligned_phase(&times, bpm, phase, checks),
                    subdivision: None,
                }
            }
            None => {
                let estimate = self.estimate_bpm(&onsets, &times, &mut metadata)?;
                metadata.provisional_offset = Some(estimate.phase_offset);
                estimate
            }
        };

        // NeedOffsetOrSubdivision
        let (subdivision, needs_halving) = match request.known_subdivision {
            Some(subdivision) => (subdivision, false),
            None if request.detect_time_scale => {
                let classified = match estimate.subdivision {
                    Some(result) => Some(result),
                    None => classify_subdivision(
                        onsets.frames(),
                        onsets.envelope(),
                        estimate.bpm,
                        estimate.phase_offset,
                    )?,
                };
                match classified {
                    Some(result) => (result.subdivision, result.needs_halving),
                    None => {
                        log::warn!(
                            "Subdivision undetermined at {:.1} BPM; falling back to 4",
                            estimate.bpm
                        );
                        metadata.flags.push(DetectionFlag::SubdivisionFallback);
                        (4, false)
                    }
                }
            }
            None => (estimate.subdivision.map_or(4, |r| r.subdivision), false),
        };

        let mut bpm = estimate.bpm;
        if needs_halving && request.known_bpm.is_none() {
            let doubled = bpm * 2.0;
            if doubled <= BPM_CEILING {
                log::debug!("Half-tempo candidate: {:.1} -> {:.1} BPM", bpm, doubled);
                bpm = doubled;
                metadata.flags.push(DetectionFlag::TempoDoubled);
            } else {
                log::debug!(
                    "Doubling {:.1} BPM suppressed by the {:.0} BPM ceiling",
                    bpm,
                    BPM_CEILING
                );
                metadata.flags.push(DetectionFlag::DoublingSuppressed);
            }
        }

        let (offset, add) = if request.detect_offset {
            let grid = find_offset(&times, bpm)?;
            (Some(grid.offset), Some(grid.add()))
        } else {
            (None, None)
        };

        metadata.processing_time_ms = start_time.elapsed().as_secs_f32() * 1000.0;
        log::debug!(
            "Detection complete in {:.2} ms: {:.1} BPM, subdivision {}, offset {:?}",
            metadata.processing_time_ms,
            bpm,
            subdivision,
            offset
        );

        Ok(Detection {
            bpm,
            subdivision,
            offset,
            add,
            metadata,
        })
    }

    fn onsets<'r>(&self, input: &AudioInput<'r>) -> Result<Cow<'r, OnsetData>, AnalysisError> {
        match *input {
            AudioInput::Path(path) => {
                let (samples, sample_rate) = self.loader.load(path)?;
                if sample_rate != SAMPLE_RATE {
                    return Err(AnalysisError::InvalidInput(format!(
                        "Loader returned {} Hz for {}, expected {} Hz",
                        sample_rate,
                        path.display(),
                        SAMPLE_RATE
                    )));
                }
                Ok(Cow::Owned(self.extractor.extract(&samples, sample_rate)?))
            }
            AudioInput::Signal {
                samples,
                sample_rate,
            } => Ok(Cow::Owned(self.extractor.extract(samples, sample_rate)?)),
            AudioInput::Onsets(onsets) => Ok(Cow::Borrowed(onsets)),
        }
    }

    fn candidate_grid(&self, onsets: &OnsetData) -> Result<Vec<f64>, AnalysisError> {
        match self.config.candidate_source {
            CandidateSource::GapEstimate => Ok(estimate_ballpark(onsets.frames())?.candidates),
            CandidateSource::FixedRange => Ok(bpm_steps(SIMPLE_MIN_BPM, 2.0 * SIMPLE_MIN_BPM)
                .into_iter()
                .map(step_to_bpm)
                .collect()),
        }
    }

    fn estimate_bpm(
        &self,
        onsets: &OnsetData,
        times: &[f64],
        metadata: &mut DetectionMetadata,
    ) -> Result<TempoEstimate, AnalysisError> {
        let checks = self.config.match_score_checks;
        let grid = self.candidate_grid(onsets)?;
        let mut candidates =
            score_candidates(times, &grid, checks, self.config.parallel_scoring)?;
        metadata.candidates_scored = candidates.len();

        if self.config.selection == SelectionMode::Simple {
            let index = select_best_index(&mut candidates)?;
            let best = &candidates[index];
            return Ok(TempoEstimate {
                bpm: best.bpm,
                phase_offset: aligned_phase(times, best.bpm, best.phase_offset, checks),
                subdivision: None,
            });
        }

        let ranked = rank_for_cross_validation(&mut candidates)?;
        for &index in &ranked {
            let candidate = &candidates[index];
            metadata.cross_validated.push(candidate.bpm);
            // Checkpoint phases are too coarse for the classifier's one-hop window
            let phase = aligned_phase(times, candidate.bpm, candidate.phase_offset, checks);
            let classified =
                classify_subdivision(onsets.frames(), onsets.envelope(), candidate.bpm, phase)?;
            if let Some(result) = classified {
                log::debug!(
                    "Cross-validated {:.1} BPM: subdivision {}, halving {}",
                    candidate.bpm,
                    result.subdivision,
                    result.needs_halving
                );
                return Ok(TempoEstimate {
                    bpm: candidate.bpm,
                    phase_offset: phase,
                    subdivision: Some(result),
                });
            }
        }

        let best = ranked
            .first()
            .map(|&index| &candidates[index])
            .ok_or_else(|| {
                AnalysisError::ProcessingError("No ranked BPM candidates".to_string())
            })?;
        log::warn!(
            "No candidate produced a subdivision; falling back to {:.1} BPM with subdivision 4",
            best.bpm
        );
        metadata.flags.push(DetectionFlag::SubdivisionFallback);
        Ok(TempoEstimate {
            bpm: best.bpm,
            phase_offset: aligned_phase(times, best.bpm, best.phase_offset, checks),
            subdivision: Some(SubdivisionResult {
                subdivision: 4,
                needs_halving: false,
            }),
        })
    }
}
