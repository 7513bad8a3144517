//! Heron DSP - Digital Signal Processing Module
//!
//! This crate provides the filter chain behind Heron's equalizer:
//! - Coefficient factory for peak, low-cut and high-cut biquads (RBJ cookbook)
//! - Cascaded cut filters with 12/24/36/48 dB/octave slopes
//! - Stereo chain: low-cut -> peak -> high-cut per channel
//! - Magnitude queries for drawing the response curve
//!
//! # Architecture
//!
//! The DSP chain follows a strict "no allocation in audio callback" rule.
//! Coefficients are plain values, recomputed between buffers and swapped in
//! without touching the filters' delay lines.

mod chain;
mod chain_settings;
mod coefficients;
mod cut_filter;
mod error;
mod magnitude;
mod processor;
mod slope;
mod stage;

pub use chain::{Channel, ChainCoefficients, MonoChain, StereoChain};
pub use chain_settings::{
    ChainSettings, FREQ_MAX, FREQ_MIN, GAIN_DB_MAX, GAIN_DB_MIN, NYQUIST_FRACTION, QUALITY_MAX,
    QUALITY_MIN,
};
pub use coefficients::{
    butterworth_cut_coefficients, butterworth_stage_q, db_to_gain, gain_to_db, high_cut_coefficients,
    high_pass_section, low_cut_coefficients, low_pass_section, peak_coefficients, unity_coefficients,
    CutCoefficients, CutDesign, CutKind,
};
pub use cut_filter::CutFilter;
pub use error::DspError;
pub use magnitude::{
    biquad_magnitude, log_frequency, response_curve, MagnitudeResponse, ResponsePoint,
    RESPONSE_MAX_HZ, RESPONSE_MIN_HZ,
};
pub use processor::{AudioProcessor, ProcessContext};
pub use slope::{Slope, MAX_CUT_STAGES};
pub use stage::FilterStage;

// Coefficient storage type, re-exported so callers need not depend on biquad
pub use biquad::{Coefficients, Q_BUTTERWORTH_F32};
