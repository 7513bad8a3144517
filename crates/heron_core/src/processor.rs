//! EQ Processor
//!
//! Audio-side owner of the stereo chain. Once per block it checks the
//! parameter store's change flag and, if set, rebuilds coefficients from a
//! fresh snapshot before filtering.
//!
//! One processor per [`EqParameters`] store: the change flag is consumed
//! on read.

use std::sync::Arc;

use heron_dsp::{
    AudioProcessor, ChainCoefficients, ChainSettings, CutDesign, DspError, ProcessContext, StereoChain,
};

use crate::parameters::EqParameters;

pub struct EqProcessor {
    chain: StereoChain,
    parameters: Arc<EqParameters>,
    design: CutDesign,
    sample_rate: f32,
    /// Settings behind the installed coefficients (already clamped)
    applied: ChainSettings,
    /// Set by `prepare` so the next block recomputes regardless of the flag
    force_update: bool,
    update_count: u64,
}

impl EqProcessor {
    pub fn new(parameters: Arc<EqParameters>, sample_rate: f32, design: CutDesign) -> Result<Self, DspError> {
        let mut processor = Self {
            chain: StereoChain::new(sample_rate),
            parameters,
            design,
            sample_rate,
            applied: ChainSettings::default(),
            force_update: true,
            update_count: 0,
        };
        processor.prepare(sample_rate)?;
        Ok(processor)
    }

    /// Adopt a new sample rate, clear filter memory and schedule a
    /// coefficient rebuild for the next block
    pub fn prepare(&mut self, sample_rate: f32) -> Result<(), DspError> {
        self.chain.prepare(sample_rate)?;
        self.sample_rate = sample_rate;
        self.force_update = true;
        // Recompute now so the first block is already correct
        self.update_if_changed();
        Ok(())
    }

    /// Rebuild coefficients if any parameter changed since the last call
    ///
    /// Returns whether new coefficients were installed. A snapshot that
    /// keeps colliding with a writer leaves the old coefficients in place
    /// and retries on the next block.
    #[inline]
    pub fn update_if_changed(&mut self) -> bool {
        let changed = self.parameters.take_changes() | std::mem::take(&mut self.force_update);
        if !changed {
            return false;
        }

        match self.parameters.try_snapshot() {
            Some(settings) => {
                self.apply_settings(&settings);
                true
            }
            None => {
                self.force_update = true;
                false
            }
        }
    }

    /// Update (if needed) then filter one planar stereo block
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.update_if_changed();
        self.chain.process_block(left, right);
    }

    /// Update (if needed) then filter one interleaved stereo block
    pub fn process_interleaved(&mut self, buffer: &mut [f32]) {
        self.update_if_changed();
        self.chain.process_interleaved(buffer);
    }

    /// Settings behind the coefficients currently installed
    pub fn applied_settings(&self) -> &ChainSettings {
        &self.applied
    }

    /// Coefficients currently installed, for response plotting
    pub fn coefficients(&self) -> ChainCoefficients {
        ChainCoefficients::from_settings(&self.applied, self.sample_rate, self.design)
    }

    pub fn chain(&self) -> &StereoChain {
        &self.chain
    }

    pub fn parameters(&self) -> &Arc<EqParameters> {
        &self.parameters
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn design(&self) -> CutDesign {
        self.design
    }

    /// Number of coefficient rebuilds so far
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    fn apply_settings(&mut self, settings: &ChainSettings) {
        let clamped = settings.clamped_for(self.sample_rate);
        self.chain.update_filters(&clamped, self.sample_rate, self.design);
        self.applied = clamped;
        self.update_count += 1;
    }
}

impl AudioProcessor for EqProcessor {
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        debug_assert_eq!(context.channels, 2);
        self.process_interleaved(buffer);
    }

    fn reset(&mut self) {
        self.chain.reset();
    }

    fn name(&self) -> &'static str {
        "Heron EQ"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterId;
    use heron_dsp::{MagnitudeResponse, Slope};
    use std::f32::consts::PI;
    use std::thread;

    fn processor() -> (Arc<EqParameters>, EqProcessor) {
        let params = Arc::new(EqParameters::new());
        let processor = EqProcessor::new(Arc::clone(&params), 48000.0, CutDesign::default()).unwrap();
        (params, processor)
    }

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn peak_after(samples: &[f32], skip: usize) -> f32 {
        samples[skip..].iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn test_new_installs_current_parameters() {
        let params = Arc::new(EqParameters::new());
        params.set(ParameterId::PeakGain, 6.0);

        let processor = EqProcessor::new(Arc::clone(&params), 48000.0, CutDesign::default()).unwrap();
        assert_eq!(processor.applied_settings().peak_gain_db, 6.0);
        assert_eq!(processor.update_count(), 1);
        assert!(!params.is_dirty());
    }

    #[test]
    fn test_invalid_sample_rate_rejected() {
        let params = Arc::new(EqParameters::new());
        assert!(EqProcessor::new(params, 0.0, CutDesign::default()).is_err());
    }

    #[test]
    fn test_no_recompute_without_changes() {
        let (_params, mut processor) = processor();
        let before = processor.update_count();

        let mut left = vec![0.0; 64];
        let mut right = vec![0.0; 64];
        for _ in 0..10 {
            processor.process_block(&mut left, &mut right);
        }
        assert_eq!(processor.update_count(), before);
    }

    #[test]
    fn test_edits_coalesce_into_one_update() {
        let (params, mut processor) = processor();
        let before = processor.update_count();

        params.set(ParameterId::PeakGain, 3.0);
        params.set(ParameterId::PeakGain, 4.0);
        params.set(ParameterId::PeakFreq, 2000.0);
        params.set(ParameterId::HighCutSlope, 2.0);

        let mut left = vec![0.0; 32];
        let mut right = vec![0.0; 32];
        processor.process_block(&mut left, &mut right);
        processor.process_block(&mut left, &mut right);

        assert_eq!(processor.update_count(), before + 1);
        let applied = processor.applied_settings();
        assert_eq!(applied.peak_gain_db, 4.0);
        assert_eq!(applied.peak_freq, 2000.0);
        assert_eq!(applied.high_cut_slope, Slope::Db36);
        assert_eq!(processor.chain().channel(heron_dsp::Channel::Left).high_cut().active_stage_count(), 3);
    }

    #[test]
    fn test_prepare_forces_recompute_at_new_rate() {
        let (params, mut processor) = processor();
        params.set(ParameterId::HighCutFreq, 20000.0);
        processor.update_if_changed();

        processor.prepare(22050.0).unwrap();
        assert_eq!(processor.sample_rate(), 22050.0);
        // High cut is pulled under the new Nyquist limit
        assert!(processor.applied_settings().high_cut_freq < 11025.0);
        assert!(!processor.update_if_changed());
    }

    #[test]
    fn test_peak_boost_reaches_audio() {
        let (params, mut processor) = processor();
        params.set(ParameterId::PeakFreq, 1000.0);
        params.set(ParameterId::PeakGain, 6.0);

        let mut left = sine(1000.0, 48000.0, 9600);
        let mut right = vec![0.0; 9600];
        processor.process_block(&mut left, &mut right);

        let gain_db = 20.0 * peak_after(&left, 4800).log10();
        assert!((gain_db - 6.0).abs() < 0.2, "gain {}", gain_db);
        assert!(right.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_coefficients_follow_applied_settings() {
        let (params, mut processor) = processor();
        params.set(ParameterId::PeakFreq, 1000.0);
        params.set(ParameterId::PeakGain, -6.0);
        processor.update_if_changed();

        let at_peak = processor.coefficients().magnitude_db(1000.0);
        assert!((at_peak + 6.0).abs() < 0.01, "{}", at_peak);
    }

    #[test]
    fn test_as_audio_processor() {
        let (_params, mut processor) = processor();
        assert_eq!(processor.name(), "Heron EQ");

        let mut buffer = vec![0.25, -0.25, 0.5, -0.5];
        let context = ProcessContext::new(48000.0, 2, 2);
        AudioProcessor::process(&mut processor, &mut buffer, &context);
        assert!(buffer.iter().all(|s| s.is_finite()));

        AudioProcessor::reset(&mut processor);
        let mut silence = vec![0.0; 8];
        AudioProcessor::process(&mut processor, &mut silence, &context);
        assert_eq!(silence, vec![0.0; 8]);
    }

    #[test]
    fn test_concurrent_writer_keeps_output_finite() {
        let (params, mut processor) = processor();

        let writer = {
            let params = Arc::clone(&params);
            thread::spawn(move || {
                for i in 0..5_000 {
                    let t = (i % 100) as f32 / 100.0;
                    params.set(ParameterId::PeakFreq, 100.0 + t * 10_000.0);
                    params.set(ParameterId::PeakGain, -24.0 + t * 48.0);
                    params.set(ParameterId::LowCutSlope, (i % 4) as f32);
                }
            })
        };

        let mut left = sine(440.0, 48000.0, 128);
        let mut right = sine(880.0, 48000.0, 128);
        for _ in 0..2_000 {
            processor.process_block(&mut left, &mut right);
            assert!(left.iter().chain(right.iter()).all(|s| s.is_finite()));
        }
        writer.join().unwrap();

        // Last edits are always picked up eventually
        processor.update_if_changed();
        assert_eq!(*processor.applied_settings(), params.snapshot().clamped_for(48000.0));
    }
}
