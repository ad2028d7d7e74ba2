//! Error types for BPM/offset detection

use std::fmt;

/// Errors that can occur during detection
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Invalid or contradictory input parameters
    InvalidInput(String),

    /// Not enough onset data to run the requested stage
    InsufficientData(String),

    /// Audio decoding error
    DecodingError(String),

    /// Processing error during analysis (non-finite intermediate values, etc.)
    ProcessingError(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AnalysisError::InsufficientData(msg) => write!(f, "Insufficient data: {}", msg),
            AnalysisError::DecodingError(msg) => write!(f, "Decoding error: {}", msg),
            AnalysisError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}
