//! Feature extraction modules
//!
//! This module contains the detection stages:
//! - Onset detection (mel spectral flux + peak picking)
//! - Period estimation (gap ballpark, candidate scoring and selection)
//! - Beat tracking (subdivision classification, offset search)

pub mod beat_tracking;
pub mod onset;
pub mod period;
