//! Chain Settings
//!
//! The seven user-facing values that fully determine the filter chain.

use serde::{Deserialize, Serialize};

use crate::slope::Slope;

/// Lowest frequency any filter can be tuned to (Hz)
pub const FREQ_MIN: f32 = 20.0;
/// Highest frequency any filter can be tuned to (Hz)
pub const FREQ_MAX: f32 = 20_000.0;

pub const GAIN_DB_MIN: f32 = -24.0;
pub const GAIN_DB_MAX: f32 = 24.0;

pub const QUALITY_MIN: f32 = 0.1;
pub const QUALITY_MAX: f32 = 10.0;

/// Fraction of the sample rate a filter frequency is clamped below.
/// Keeps the bilinear-transform poles inside the unit circle.
pub const NYQUIST_FRACTION: f32 = 0.49;

/// Snapshot of every user-adjustable parameter at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainSettings {
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_quality: f32,
    pub low_cut_freq: f32,
    pub high_cut_freq: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            peak_freq: 750.0,
            peak_gain_db: 0.0,
            peak_quality: 1.0,
            low_cut_freq: FREQ_MIN,
            high_cut_freq: FREQ_MAX,
            low_cut_slope: Slope::Db12,
            high_cut_slope: Slope::Db12,
        }
    }
}

impl ChainSettings {
    /// Highest usable filter frequency at `sample_rate`
    pub fn max_frequency(sample_rate: f32) -> f32 {
        FREQ_MAX.min(sample_rate * NYQUIST_FRACTION).max(FREQ_MIN)
    }

    /// Copy with every value forced into its valid domain for `sample_rate`
    ///
    /// Non-finite values fall back to the defaults. The coefficient factory
    /// does not re-check its inputs, so callers run settings through this
    /// first.
    pub fn clamped_for(&self, sample_rate: f32) -> Self {
        let defaults = Self::default();
        let max_freq = Self::max_frequency(sample_rate);

        Self {
            peak_freq: sanitize(self.peak_freq, defaults.peak_freq, FREQ_MIN, max_freq),
            peak_gain_db: sanitize(self.peak_gain_db, defaults.peak_gain_db, GAIN_DB_MIN, GAIN_DB_MAX),
            peak_quality: sanitize(self.peak_quality, defaults.peak_quality, QUALITY_MIN, QUALITY_MAX),
            low_cut_freq: sanitize(self.low_cut_freq, defaults.low_cut_freq, FREQ_MIN, max_freq),
            high_cut_freq: sanitize(self.high_cut_freq, max_freq, FREQ_MIN, max_freq),
            low_cut_slope: self.low_cut_slope,
            high_cut_slope: self.high_cut_slope,
        }
    }
}

fn sanitize(value: f32, fallback: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_in_range() {
        let settings = ChainSettings::default();
        assert_eq!(settings.clamped_for(48000.0), settings);
        assert_eq!(settings.peak_gain_db, 0.0);
        assert_eq!(settings.low_cut_slope, Slope::Db12);
    }

    #[test]
    fn test_clamping() {
        let wild = ChainSettings {
            peak_freq: 5.0,
            peak_gain_db: 40.0,
            peak_quality: 0.0,
            low_cut_freq: -100.0,
            high_cut_freq: 90_000.0,
            ..Default::default()
        };

        let clamped = wild.clamped_for(48000.0);
        assert_eq!(clamped.peak_freq, FREQ_MIN);
        assert_eq!(clamped.peak_gain_db, GAIN_DB_MAX);
        assert_eq!(clamped.peak_quality, QUALITY_MIN);
        assert_eq!(clamped.low_cut_freq, FREQ_MIN);
        assert_eq!(clamped.high_cut_freq, FREQ_MAX);
    }

    #[test]
    fn test_clamping_respects_nyquist() {
        let settings = ChainSettings::default().clamped_for(32000.0);
        assert!(settings.high_cut_freq < 16000.0);
        assert_eq!(settings.high_cut_freq, 32000.0 * NYQUIST_FRACTION);
    }

    #[test]
    fn test_non_finite_values_fall_back() {
        let broken = ChainSettings {
            peak_freq: f32::NAN,
            peak_gain_db: f32::INFINITY,
            ..Default::default()
        };

        let clamped = broken.clamped_for(44100.0);
        assert_eq!(clamped.peak_freq, 750.0);
        assert_eq!(clamped.peak_gain_db, 0.0);
    }

    #[test]
    fn test_serialization() {
        let settings = ChainSettings {
            low_cut_slope: Slope::Db36,
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: ChainSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
