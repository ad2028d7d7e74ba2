//! Detection result types

use serde::{Deserialize, Serialize};

use crate::features::beat_tracking::BeatGrid;

/// Notable decisions taken while detecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionFlag {
    /// No ranked candidate produced a valid subdivision; the best one was used with 4
    SubdivisionFallback,
    /// The classifier reported a half-tempo candidate and the BPM was doubled
    TempoDoubled,
    /// Doubling was suggested but would exceed the tempo ceiling
    DoublingSuppressed,
}

/// Detection metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionMetadata {
    /// Number of onsets the estimate is based on
    pub onset_count: usize,

    /// Number of BPM candidates scored (0 when the BPM was supplied)
    pub candidates_scored: usize,

    /// Candidate BPMs tried during cross-validation, in order
    pub cross_validated: Vec<f64>,

    /// Grid phase found while scoring the winning candidate, before the offset search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisional_offset: Option<f64>,

    /// Decisions worth surfacing
    pub flags: Vec<DetectionFlag>,

    /// Processing time in milliseconds
    pub processing_time_ms: f32,

    /// Algorithm version
    pub algorithm_version: String,
}

impl Default for DetectionMetadata {
    fn default() -> Self {
        Self {
            onset_count: 0,
            candidates_scored: 0,
            cross_validated: vec![],
            provisional_offset: None,
            flags: vec![],
            processing_time_ms: 0.0,
            algorithm_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Complete detection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Tempo in beats per minute
    pub bpm: f64,

    /// Pulses per beat: 3 or 4
    pub subdivision: u32,

    /// Grid offset in seconds within `(-period/2, period/2]`, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,

    /// Seconds of silence to prepend for a zero offset, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add: Option<f64>,

    /// Detection metadata
    pub metadata: DetectionMetadata,
}

impl Detection {
    /// Beat grid, available when the offset was detected
    pub fn beat_grid(&self) -> Option<BeatGrid> {
        self.offset.map(|offset| BeatGrid::new(self.bpm, offset))
    }

    /// True if `flag` was raised during detection
    pub fn has_flag(&self, flag: DetectionFlag) -> bool {
        self.metadata.flags.contains(&flag)
    }
}
