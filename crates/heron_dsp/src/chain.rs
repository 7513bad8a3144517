//! Stereo Filter Chain
//!
//! Two independent `low-cut -> peak -> high-cut` chains, one per channel.
//! Both channels always run the same coefficients but never share delay
//! lines.

use biquad::Coefficients;

use crate::chain_settings::ChainSettings;
use crate::coefficients::{gain_to_db, peak_coefficients, CutCoefficients, CutDesign, CutKind};
use crate::cut_filter::CutFilter;
use crate::error::DspError;
use crate::magnitude::{biquad_magnitude, MagnitudeResponse};
use crate::slope::Slope;
use crate::stage::FilterStage;

/// Audio channel selector for the stereo chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

/// Every coefficient the chain needs, derived from one `ChainSettings`
///
/// Immutable once built; the same value is installed into both channels and
/// can be handed to the UI for response plotting.
#[derive(Debug, Clone, Copy)]
pub struct ChainCoefficients {
    pub low_cut: CutCoefficients,
    pub low_cut_slope: Slope,
    pub peak: Coefficients<f32>,
    pub high_cut: CutCoefficients,
    pub high_cut_slope: Slope,
    pub sample_rate: f32,
}

impl ChainCoefficients {
    /// Run the coefficient factory for all three filters
    ///
    /// `settings` must already be inside the valid domain for `sample_rate`
    /// (see [`ChainSettings::clamped_for`]).
    pub fn from_settings(settings: &ChainSettings, sample_rate: f32, design: CutDesign) -> Self {
        Self {
            low_cut: design.cut_coefficients(
                CutKind::LowCut,
                settings.low_cut_freq,
                settings.low_cut_slope,
                sample_rate,
            ),
            low_cut_slope: settings.low_cut_slope,
            peak: peak_coefficients(
                settings.peak_freq,
                settings.peak_gain_db,
                settings.peak_quality,
                sample_rate,
            ),
            high_cut: design.cut_coefficients(
                CutKind::HighCut,
                settings.high_cut_freq,
                settings.high_cut_slope,
                sample_rate,
            ),
            high_cut_slope: settings.high_cut_slope,
            sample_rate,
        }
    }
}

impl MagnitudeResponse for ChainCoefficients {
    /// Peak plus the active cut stages only
    fn magnitude_db(&self, frequency: f32) -> f64 {
        let sr = self.sample_rate;
        let cut = |bank: &CutCoefficients, slope: Slope| -> f64 {
            bank[..slope.stage_count()]
                .iter()
                .map(|c| biquad_magnitude(c, frequency, sr))
                .product()
        };

        let magnitude = biquad_magnitude(&self.peak, frequency, sr)
            * cut(&self.low_cut, self.low_cut_slope)
            * cut(&self.high_cut, self.high_cut_slope);

        gain_to_db(magnitude)
    }
}

/// One channel's processing chain
pub struct MonoChain {
    low_cut: CutFilter,
    peak: FilterStage,
    high_cut: CutFilter,
    sample_rate: f32,
}

impl MonoChain {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            low_cut: CutFilter::new(),
            peak: FilterStage::new(),
            high_cut: CutFilter::new(),
            sample_rate,
        }
    }

    /// Hot-swap coefficients and slopes; delay lines are kept
    pub fn apply(&mut self, coefficients: &ChainCoefficients) {
        self.low_cut.install_coefficients(&coefficients.low_cut);
        self.low_cut.set_slope(coefficients.low_cut_slope);
        self.peak.install(coefficients.peak);
        self.high_cut.install_coefficients(&coefficients.high_cut);
        self.high_cut.set_slope(coefficients.high_cut_slope);
    }

    /// low-cut -> peak -> high-cut
    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let y = self.low_cut.process_sample(sample);
        let y = self.peak.process(y);
        self.high_cut.process_sample(y)
    }

    #[inline]
    pub fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    pub fn low_cut(&self) -> &CutFilter {
        &self.low_cut
    }

    pub fn peak(&self) -> &FilterStage {
        &self.peak
    }

    pub fn high_cut(&self) -> &CutFilter {
        &self.high_cut
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    pub fn reset(&mut self) {
        self.low_cut.reset();
        self.peak.reset();
        self.high_cut.reset();
    }
}

impl MagnitudeResponse for MonoChain {
    fn magnitude_db(&self, frequency: f32) -> f64 {
        let sr = self.sample_rate;
        gain_to_db(
            self.low_cut.magnitude(frequency, sr)
                * self.peak.magnitude(frequency, sr)
                * self.high_cut.magnitude(frequency, sr),
        )
    }
}

/// The full stereo equalizer
///
/// Designed for real-time use: no allocations after construction.
pub struct StereoChain {
    left: MonoChain,
    right: MonoChain,
    sample_rate: f32,
}

impl StereoChain {
    /// Pass-through chain; call [`update_filters`](Self::update_filters) to tune it
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: MonoChain::new(sample_rate),
            right: MonoChain::new(sample_rate),
            sample_rate,
        }
    }

    /// Clear both channels' delay lines and adopt `sample_rate`
    ///
    /// Must run before the first block and on every sample-rate change.
    /// Coefficients are left alone; they are stale until the next
    /// `update_filters` if the rate changed.
    pub fn prepare(&mut self, sample_rate: f32) -> Result<(), DspError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        self.sample_rate = sample_rate;
        for chain in [&mut self.left, &mut self.right] {
            chain.set_sample_rate(sample_rate);
            chain.reset();
        }
        Ok(())
    }

    /// Recompute every coefficient from `settings` and install into both channels
    pub fn update_filters(&mut self, settings: &ChainSettings, sample_rate: f32, design: CutDesign) {
        let coefficients = ChainCoefficients::from_settings(settings, sample_rate, design);
        self.apply(&coefficients);
    }

    /// Install a precomputed coefficient set into both channels
    pub fn apply(&mut self, coefficients: &ChainCoefficients) {
        self.left.apply(coefficients);
        self.right.apply(coefficients);
    }

    /// Process separate left/right channel buffers in place
    ///
    /// # Panics
    /// Panics if buffers have different lengths (debug builds only)
    #[inline]
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len(), "Channel buffers must be same length");

        self.left.process(left);
        self.right.process(right);
    }

    /// Process an interleaved stereo buffer in place
    ///
    /// Buffer format: [L0, R0, L1, R1, L2, R2, ...]
    #[inline]
    pub fn process_interleaved(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            frame[0] = self.left.process_sample(frame[0]);
            frame[1] = self.right.process_sample(frame[1]);
        }
    }

    pub fn channel(&self, channel: Channel) -> &MonoChain {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Clear delay lines without touching coefficients
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}
