//! Beat grid resolution modules
//!
//! Resolve a fixed BPM into a playable grid:
//! - Subdivision classification (3 vs 4 pulses per beat, tempo halving)
//! - Dense phase search for the grid offset

pub mod offset;
pub mod subdivision;

use serde::{Deserialize, Serialize};

use crate::features::period::{beat_period, wrap_residual};

/// A constant-tempo beat grid: pulses at `offset + k * 60 / bpm`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatGrid {
    /// Tempo in beats per minute
    pub bpm: f64,

    /// Phase of the grid in seconds, normalised into `(-period/2, period/2]`
    pub offset: f64,
}

impl BeatGrid {
    /// Create a grid, normalising the offset into `(-period/2, period/2]`
    pub fn new(bpm: f64, offset: f64) -> Self {
        Self {
            bpm,
            offset: wrap_residual(offset, beat_period(bpm)),
        }
    }

    /// Beat period in seconds
    pub fn period(&self) -> f64 {
        beat_period(self.bpm)
    }

    /// Seconds of silence to prepend so that the grid starts exactly at zero
    ///
    /// Always non-negative; `add + offset` is a multiple of the period.
    pub fn add(&self) -> f64 {
        if self.offset >= 0.0 {
            self.period() - self.offset
        } else {
            self.offset.abs()
        }
    }

    /// Signed distance from `time` to the nearest grid pulse
    pub fn phase_of(&self, time: f64) -> f64 {
        wrap_residual(time - self.offset, self.period())
    }
}
