//! Single biquad processing unit
//!
//! Owns one delay line and the coefficient set currently driving it.

use biquad::{Biquad, Coefficients, DirectForm2Transposed};

use crate::coefficients::unity_coefficients;
use crate::magnitude::biquad_magnitude;

/// One 2nd-order section with its own state
///
/// Starts out as a pass-through so a stage is never driven by undefined
/// coefficients, even before the first update.
pub struct FilterStage {
    // DirectForm2Transposed: better numerical stability than DF1
    filter: DirectForm2Transposed<f32>,
    coefficients: Coefficients<f32>,
}

impl Default for FilterStage {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterStage {
    pub fn new() -> Self {
        let coefficients = unity_coefficients();
        Self {
            filter: DirectForm2Transposed::<f32>::new(coefficients),
            coefficients,
        }
    }

    /// Swap in a new coefficient set, keeping the delay line intact
    #[inline]
    pub fn install(&mut self, coefficients: Coefficients<f32>) {
        self.filter.update_coefficients(coefficients);
        self.coefficients = coefficients;
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        self.filter.run(sample)
    }

    /// Clear the delay line
    pub fn reset(&mut self) {
        self.filter.reset_state();
    }

    pub fn coefficients(&self) -> &Coefficients<f32> {
        &self.coefficients
    }

    /// Linear magnitude of the installed coefficients at `frequency`
    pub fn magnitude(&self, frequency: f32, sample_rate: f32) -> f64 {
        biquad_magnitude(&self.coefficients, frequency, sample_rate)
    }
}
