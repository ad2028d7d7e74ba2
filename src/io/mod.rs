//! Audio I/O modules
//!
//! Audio decoding using Symphonia and resampling to the analysis rate.

pub mod decoder;
pub mod resample;

use std::path::Path;

use crate::config::SAMPLE_RATE;
use crate::error::AnalysisError;

/// Loads an audio file as mono samples at the analysis sample rate
pub trait AudioLoader {
    /// Load `path`, returning `(samples, sample_rate)` with `sample_rate == SAMPLE_RATE`
    fn load(&self, path: &Path) -> Result<(Vec<f32>, u32), AnalysisError>;
}

/// Symphonia-backed loader with linear resampling to [`SAMPLE_RATE`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaLoader;

impl AudioLoader for SymphoniaLoader {
    fn load(&self, path: &Path) -> Result<(Vec<f32>, u32), AnalysisError> {
        let (samples, native_rate) = decoder::decode_audio(path)?;
        if samples.is_empty() {
            return Err(AnalysisError::DecodingError(format!(
                "{}: no audio samples decoded",
                path.display()
            )));
        }
        if native_rate != SAMPLE_RATE {
            log::debug!("Resampling {} Hz -> {} Hz", native_rate, SAMPLE_RATE);
        }
        Ok((
            resample::resample_linear(&samples, native_rate, SAMPLE_RATE),
            SAMPLE_RATE,
        ))
    }
}

/// Load an audio file with the default [`SymphoniaLoader`]
pub fn load(path: &Path) -> Result<(Vec<f32>, u32), AnalysisError> {
    SymphoniaLoader.load(path)
}
