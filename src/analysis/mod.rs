//! Detection orchestration and result types
//!
//! Combines the period and beat-tracking stages into a final detection:
//! - Detector (pipeline state machine)
//! - Result types
//! - Metadata

pub mod detector;
pub mod result;
