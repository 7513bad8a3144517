//! Cascaded Cut Filter
//!
//! Up to four biquad sections in series forming one low-cut or high-cut
//! filter. The slope decides how many of them are live; the rest are
//! bypassed but keep receiving coefficients so they can be re-activated
//! without a recompute.

use biquad::Coefficients;

use crate::coefficients::CutCoefficients;
use crate::slope::{Slope, MAX_CUT_STAGES};
use crate::stage::FilterStage;

pub struct CutFilter {
    stages: [FilterStage; MAX_CUT_STAGES],
    bypassed: [bool; MAX_CUT_STAGES],
    slope: Slope,
}

impl Default for CutFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl CutFilter {
    /// Unity coefficients everywhere, 12 dB/octave (first stage active)
    pub fn new() -> Self {
        let mut filter = Self {
            stages: core::array::from_fn(|_| FilterStage::new()),
            bypassed: [true; MAX_CUT_STAGES],
            slope: Slope::Db12,
        };
        filter.set_slope(Slope::Db12);
        filter
    }

    /// Activate the first `slope.stage_count()` stages and bypass the rest
    ///
    /// A stage that comes back from bypass has its delay line cleared, so
    /// state left over from before it was bypassed never reaches the output.
    pub fn set_slope(&mut self, slope: Slope) {
        let active = slope.stage_count();

        for i in 0..MAX_CUT_STAGES {
            let bypass = i >= active;
            if self.bypassed[i] && !bypass {
                self.stages[i].reset();
            }
            self.bypassed[i] = bypass;
        }
        self.slope = slope;
    }

    /// Assign coefficient set `i` to stage `i`, active or not
    pub fn install_coefficients(&mut self, coefficients: &CutCoefficients) {
        for (stage, c) in self.stages.iter_mut().zip(coefficients.iter()) {
            stage.install(*c);
        }
    }

    /// Run one sample through the active stages in ascending order
    ///
    /// # Real-time Safety
    /// Fixed four iterations, no allocation.
    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let mut y = sample;
        for (stage, bypassed) in self.stages.iter_mut().zip(self.bypassed.iter()) {
            if !*bypassed {
                y = stage.process(y);
            }
        }
        y
    }

    pub fn slope(&self) -> Slope {
        self.slope
    }

    pub fn active_stage_count(&self) -> usize {
        self.bypassed.iter().filter(|b| !**b).count()
    }

    /// Whether stage `index` processes samples; out-of-range indices are inactive
    pub fn is_stage_active(&self, index: usize) -> bool {
        self.bypassed.get(index).map_or(false, |b| !*b)
    }

    /// Coefficients currently held by stage `index`
    pub fn stage_coefficients(&self, index: usize) -> Option<&Coefficients<f32>> {
        self.stages.get(index).map(FilterStage::coefficients)
    }

    /// Product of the active stages' linear magnitudes at `frequency`
    pub fn magnitude(&self, frequency: f32, sample_rate: f32) -> f64 {
        self.stages
            .iter()
            .zip(self.bypassed.iter())
            .filter(|(_, bypassed)| !**bypassed)
            .map(|(stage, _)| stage.magnitude(frequency, sample_rate))
            .product()
    }

    /// Clear every stage's delay line
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}
