//! DSP Error Types

use thiserror::Error;

/// Errors that can occur during DSP setup
///
/// The per-sample path has no error path; these only surface from
/// preparation and parameter lookup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f32),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid slope: {0} dB/octave (must be 12, 24, 36 or 48)")]
    InvalidSlope(u32),

    #[error("Invalid choice index {index} (parameter has {count} choices)")]
    InvalidChoiceIndex { index: usize, count: usize },
}
