//! Parameter Store
//!
//! The seven user-facing parameters, shared lock-free between the control
//! thread (edits) and the audio thread (one snapshot per block).
//!
//! # Consistency
//!
//! Values live in `AtomicU32`s (f32 bits) guarded by a sequence counter:
//! writers make it odd while publishing and even when done, readers retry
//! if it moved. The audio side only ever makes a bounded number of
//! attempts, so it never waits on a preempted writer.

use std::fmt;
use std::hint;
use std::str::FromStr;
use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, Ordering};

use heron_dsp::{ChainSettings, DspError, Slope, FREQ_MAX, FREQ_MIN, GAIN_DB_MAX, GAIN_DB_MIN, QUALITY_MAX, QUALITY_MIN};
use serde::{Deserialize, Serialize};

/// Snapshot attempts the audio thread makes before giving up for this block
const SNAPSHOT_ATTEMPTS: usize = 4;

/// Identifies one of the seven parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterId {
    LowCutFreq,
    HighCutFreq,
    PeakFreq,
    PeakGain,
    PeakQuality,
    LowCutSlope,
    HighCutSlope,
}

impl ParameterId {
    pub const ALL: [ParameterId; 7] = [
        ParameterId::LowCutFreq,
        ParameterId::HighCutFreq,
        ParameterId::PeakFreq,
        ParameterId::PeakGain,
        ParameterId::PeakQuality,
        ParameterId::LowCutSlope,
        ParameterId::HighCutSlope,
    ];

    /// Slot in the store (and in `ALL`)
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable name used by hosts and saved state
    pub fn name(self) -> &'static str {
        match self {
            ParameterId::LowCutFreq => "LowCut Freq",
            ParameterId::HighCutFreq => "HighCut Freq",
            ParameterId::PeakFreq => "Peak Freq",
            ParameterId::PeakGain => "Peak Gain",
            ParameterId::PeakQuality => "Peak Quality",
            ParameterId::LowCutSlope => "LowCut Slope",
            ParameterId::HighCutSlope => "HighCut Slope",
        }
    }

    /// Range, default and unit of this parameter
    pub fn spec(self) -> ParameterSpec {
        let frequency = FloatRange::new(FREQ_MIN, FREQ_MAX, 0.25);

        let (kind, default, suffix) = match self {
            ParameterId::LowCutFreq => (ParameterKind::Continuous(frequency), FREQ_MIN, "Hz"),
            ParameterId::HighCutFreq => (ParameterKind::Continuous(frequency), FREQ_MAX, "Hz"),
            ParameterId::PeakFreq => (ParameterKind::Continuous(frequency), 750.0, "Hz"),
            ParameterId::PeakGain => (
                ParameterKind::Continuous(FloatRange::new(GAIN_DB_MIN, GAIN_DB_MAX, 1.0)),
                0.0,
                "dB",
            ),
            ParameterId::PeakQuality => (
                ParameterKind::Continuous(FloatRange::new(QUALITY_MIN, QUALITY_MAX, 1.0)),
                1.0,
                "",
            ),
            ParameterId::LowCutSlope | ParameterId::HighCutSlope => {
                (ParameterKind::Choice(&Slope::LABELS), 0.0, "db/Oct")
            }
        };

        ParameterSpec {
            id: self,
            kind,
            default,
            suffix,
        }
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParameterId {
    type Err = DspError;

    /// Accepts the display name ("Peak Gain") in any case, with or without
    /// spaces, dashes or underscores ("peak-gain", "peak_gain", "peakgain")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_name(s);
        Self::ALL
            .into_iter()
            .find(|id| normalize_name(id.name()) == wanted)
            .ok_or_else(|| DspError::UnknownParameter(s.to_string()))
    }
}

fn normalize_name(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Continuous value range with a skew for knob mapping
///
/// `skew < 1` spends more of the knob's travel on the low end, which suits
/// frequencies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatRange {
    pub min: f32,
    pub max: f32,
    pub skew: f32,
}

impl FloatRange {
    pub const fn new(min: f32, max: f32, skew: f32) -> Self {
        Self { min, max, skew }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Map a value into 0..=1 knob position
    pub fn to_normalized(&self, value: f32) -> f32 {
        let proportion = (self.clamp(value) - self.min) / (self.max - self.min);
        proportion.powf(self.skew)
    }

    /// Map a 0..=1 knob position back to a value
    pub fn from_normalized(&self, position: f32) -> f32 {
        let proportion = position.clamp(0.0, 1.0).powf(1.0 / self.skew);
        self.min + proportion * (self.max - self.min)
    }
}

/// What kind of value a parameter holds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterKind {
    Continuous(FloatRange),
    /// Index into a list of labels, stored as a whole-number f32
    Choice(&'static [&'static str]),
}

/// Full description of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    pub id: ParameterId,
    pub kind: ParameterKind,
    pub default: f32,
    pub suffix: &'static str,
}

impl ParameterSpec {
    /// Force `value` into the parameter's domain
    ///
    /// Continuous values are clamped; choices are rounded to the nearest
    /// valid index. Non-finite input yields the default.
    pub fn clamp(&self, value: f32) -> f32 {
        if !value.is_finite() {
            return self.default;
        }
        match self.kind {
            ParameterKind::Continuous(range) => range.clamp(value),
            ParameterKind::Choice(choices) => value.round().clamp(0.0, (choices.len() - 1) as f32),
        }
    }

    pub fn to_normalized(&self, value: f32) -> f32 {
        match self.kind {
            ParameterKind::Continuous(range) => range.to_normalized(value),
            ParameterKind::Choice(choices) => self.clamp(value) / (choices.len() - 1) as f32,
        }
    }

    pub fn from_normalized(&self, position: f32) -> f32 {
        match self.kind {
            ParameterKind::Continuous(range) => range.from_normalized(position),
            ParameterKind::Choice(choices) => self.clamp(position * (choices.len() - 1) as f32),
        }
    }

    /// Text a knob label shows for `value`
    ///
    /// Choices show their label. Values above 999.99 are shown in
    /// thousands with two decimals and a "k" prefix on the unit
    /// ("1.50 kHz"), everything else is rounded to a whole number ("750 Hz").
    pub fn display_string(&self, value: f32) -> String {
        match self.kind {
            ParameterKind::Choice(choices) => choices[self.clamp(value) as usize].to_string(),
            ParameterKind::Continuous(_) => {
                let kilo = value > 999.99;
                let shown = if kilo { value / 1000.0 } else { value };
                let mut text = format!("{:.*}", if kilo { 2 } else { 0 }, shown);

                if !self.suffix.is_empty() {
                    text.push(' ');
                    if kilo {
                        text.push('k');
                    }
                    text.push_str(self.suffix);
                }
                text
            }
        }
    }
}

/// Lock-free store for the seven parameters plus the change flag
pub struct EqParameters {
    values: [AtomicU32; 7],
    sequence: AtomicU64,
    dirty: AtomicBool,
}

impl Default for EqParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl EqParameters {
    /// Store holding every parameter's default, flagged dirty
    pub fn new() -> Self {
        Self::from_settings(&ChainSettings::default())
    }

    /// Store seeded from `settings` (clamped), flagged dirty
    pub fn from_settings(settings: &ChainSettings) -> Self {
        let store = Self {
            values: core::array::from_fn(|_| AtomicU32::new(0)),
            sequence: AtomicU64::new(0),
            dirty: AtomicBool::new(true),
        };
        store.set_settings(settings);
        store
    }

    /// Clamp and publish one value; returns what was stored
    pub fn set(&self, id: ParameterId, value: f32) -> f32 {
        let value = id.spec().clamp(value);
        let seq = self.begin_write();
        self.values[id.index()].store(value.to_bits(), Ordering::Relaxed);
        self.end_write(seq);
        value
    }

    /// `set` addressed by parameter name
    pub fn set_by_name(&self, name: &str, value: f32) -> Result<f32, DspError> {
        let id = name.parse::<ParameterId>()?;
        Ok(self.set(id, value))
    }

    /// Publish all seven values as one consistent update
    pub fn set_settings(&self, settings: &ChainSettings) {
        let values = settings_to_values(settings);
        let seq = self.begin_write();
        for id in ParameterId::ALL {
            let value = id.spec().clamp(values[id.index()]);
            self.values[id.index()].store(value.to_bits(), Ordering::Relaxed);
        }
        self.end_write(seq);
    }

    /// Latest value of one parameter
    pub fn get(&self, id: ParameterId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Relaxed))
    }

    /// Consistent read of all seven values, retrying until one succeeds
    ///
    /// May spin while a writer is mid-publish. Control side only; the audio
    /// thread uses [`try_snapshot`](Self::try_snapshot).
    pub fn snapshot(&self) -> ChainSettings {
        loop {
            if let Some(settings) = self.read_consistent() {
                return settings;
            }
            hint::spin_loop();
        }
    }

    /// Consistent read with a bounded number of attempts
    ///
    /// # Real-time Safety
    /// No locks, no allocation, at most `SNAPSHOT_ATTEMPTS` passes.
    #[inline]
    pub fn try_snapshot(&self) -> Option<ChainSettings> {
        (0..SNAPSHOT_ATTEMPTS).find_map(|_| self.read_consistent())
    }

    /// Check-and-clear the change flag
    ///
    /// Any number of edits since the last call collapse into one `true`.
    #[inline]
    pub fn take_changes(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Raise the change flag without editing anything
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Display text for the current value of `id`
    pub fn display_string(&self, id: ParameterId) -> String {
        id.spec().display_string(self.get(id))
    }

    fn begin_write(&self) -> u64 {
        loop {
            let seq = self.sequence.load(Ordering::Relaxed);
            if seq & 1 == 0
                && self
                    .sequence
                    .compare_exchange_weak(seq, seq + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                fence(Ordering::Release);
                return seq + 1;
            }
            hint::spin_loop();
        }
    }

    fn end_write(&self, seq: u64) {
        self.sequence.store(seq + 1, Ordering::Release);
        self.dirty.store(true, Ordering::Release);
    }

    fn read_consistent(&self) -> Option<ChainSettings> {
        let before = self.sequence.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }

        let values: [f32; 7] = core::array::from_fn(|i| f32::from_bits(self.values[i].load(Ordering::Relaxed)));

        fence(Ordering::Acquire);
        if self.sequence.load(Ordering::Relaxed) != before {
            return None;
        }
        Some(values_to_settings(&values))
    }
}

fn settings_to_values(settings: &ChainSettings) -> [f32; 7] {
    let mut values = [0.0; 7];
    values[ParameterId::LowCutFreq.index()] = settings.low_cut_freq;
    values[ParameterId::HighCutFreq.index()] = settings.high_cut_freq;
    values[ParameterId::PeakFreq.index()] = settings.peak_freq;
    values[ParameterId::PeakGain.index()] = settings.peak_gain_db;
    values[ParameterId::PeakQuality.index()] = settings.peak_quality;
    values[ParameterId::LowCutSlope.index()] = settings.low_cut_slope.index() as f32;
    values[ParameterId::HighCutSlope.index()] = settings.high_cut_slope.index() as f32;
    values
}

fn values_to_settings(values: &[f32; 7]) -> ChainSettings {
    // Stored choices are already clamped whole numbers
    let slope = |id: ParameterId| Slope::from_index(values[id.index()] as usize).unwrap_or_default();

    ChainSettings {
        peak_freq: values[ParameterId::PeakFreq.index()],
        peak_gain_db: values[ParameterId::PeakGain.index()],
        peak_quality: values[ParameterId::PeakQuality.index()],
        low_cut_freq: values[ParameterId::LowCutFreq.index()],
        high_cut_freq: values[ParameterId::HighCutFreq.index()],
        low_cut_slope: slope(ParameterId::LowCutSlope),
        high_cut_slope: slope(ParameterId::HighCutSlope),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_spec_defaults_match_chain_defaults() {
        let from_specs: [f32; 7] = core::array::from_fn(|i| ParameterId::ALL[i].spec().default);
        assert_eq!(values_to_settings(&from_specs), ChainSettings::default());
    }

    #[test]
    fn test_index_matches_all_order() {
        for (i, id) in ParameterId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Peak Gain".parse::<ParameterId>().unwrap(), ParameterId::PeakGain);
        assert_eq!("lowcut-slope".parse::<ParameterId>().unwrap(), ParameterId::LowCutSlope);
        assert_eq!("high_cut_freq".parse::<ParameterId>().unwrap(), ParameterId::HighCutFreq);
        assert_eq!(
            "Tilt".parse::<ParameterId>(),
            Err(DspError::UnknownParameter("Tilt".to_string()))
        );
    }

    #[test]
    fn test_spec_clamping() {
        assert_eq!(ParameterId::PeakGain.spec().clamp(30.0), 24.0);
        assert_eq!(ParameterId::PeakQuality.spec().clamp(0.0), 0.1);
        assert_eq!(ParameterId::LowCutSlope.spec().clamp(2.6), 3.0);
        assert_eq!(ParameterId::LowCutSlope.spec().clamp(-1.0), 0.0);
        assert_eq!(ParameterId::PeakFreq.spec().clamp(f32::NAN), 750.0);
    }

    #[test]
    fn test_display_strings() {
        assert_eq!(ParameterId::PeakFreq.spec().display_string(750.0), "750 Hz");
        assert_eq!(ParameterId::HighCutFreq.spec().display_string(1500.0), "1.50 kHz");
        assert_eq!(ParameterId::HighCutFreq.spec().display_string(20000.0), "20.00 kHz");
        assert_eq!(ParameterId::PeakGain.spec().display_string(-6.0), "-6 dB");
        assert_eq!(ParameterId::PeakQuality.spec().display_string(1.0), "1");
        assert_eq!(ParameterId::LowCutSlope.spec().display_string(2.0), "36 db/Oct");
    }

    #[test]
    fn test_normalized_mapping() {
        let spec = ParameterId::PeakFreq.spec();
        assert_eq!(spec.to_normalized(FREQ_MIN), 0.0);
        assert!((spec.to_normalized(FREQ_MAX) - 1.0).abs() < 1e-6);

        // Skewed: 1 kHz sits well past the linear position
        let position = spec.to_normalized(1000.0);
        assert!(position > 0.4 && position < 0.5, "{}", position);
        assert!((spec.from_normalized(position) - 1000.0).abs() < 0.5);

        let slope = ParameterId::HighCutSlope.spec();
        assert_eq!(slope.from_normalized(1.0), 3.0);
        assert_eq!(slope.to_normalized(1.0), 1.0 / 3.0);
    }

    #[test]
    fn test_set_and_get() {
        let params = EqParameters::new();
        assert_eq!(params.set(ParameterId::PeakGain, 6.0), 6.0);
        assert_eq!(params.get(ParameterId::PeakGain), 6.0);

        assert_eq!(params.set(ParameterId::PeakGain, 99.0), 24.0);
        assert_eq!(params.set_by_name("peak quality", 2.5).unwrap(), 2.5);
        assert!(params.set_by_name("nope", 1.0).is_err());
        assert_eq!(params.display_string(ParameterId::PeakGain), "24 dB");
    }

    #[test]
    fn test_snapshot_reflects_edits() {
        let params = EqParameters::new();
        params.set(ParameterId::LowCutSlope, 3.0);
        params.set(ParameterId::PeakFreq, 1200.0);

        let settings = params.snapshot();
        assert_eq!(settings.low_cut_slope, Slope::Db48);
        assert_eq!(settings.peak_freq, 1200.0);
        assert_eq!(params.try_snapshot(), Some(settings));
    }

    #[test]
    fn test_settings_round_trip() {
        let settings = ChainSettings {
            peak_freq: 3000.0,
            peak_gain_db: -4.5,
            peak_quality: 0.7,
            low_cut_freq: 90.0,
            high_cut_freq: 11000.0,
            low_cut_slope: Slope::Db24,
            high_cut_slope: Slope::Db36,
        };
        let params = EqParameters::from_settings(&settings);
        assert_eq!(params.snapshot(), settings);
    }

    #[test]
    fn test_dirty_flag_coalesces() {
        let params = EqParameters::new();
        // Fresh store always asks for a first recompute
        assert!(params.take_changes());
        assert!(!params.take_changes());

        params.set(ParameterId::PeakGain, 1.0);
        params.set(ParameterId::PeakGain, 2.0);
        params.set(ParameterId::PeakFreq, 900.0);
        assert!(params.is_dirty());
        assert!(params.take_changes());
        assert!(!params.take_changes());

        params.mark_dirty();
        assert!(params.take_changes());
    }

    #[test]
    fn test_concurrent_snapshots_are_consistent() {
        let a = ChainSettings {
            peak_freq: 500.0,
            peak_gain_db: 6.0,
            peak_quality: 2.0,
            low_cut_freq: 40.0,
            high_cut_freq: 15000.0,
            low_cut_slope: Slope::Db24,
            high_cut_slope: Slope::Db12,
        };
        let b = ChainSettings {
            peak_freq: 5000.0,
            peak_gain_db: -6.0,
            peak_quality: 0.5,
            low_cut_freq: 400.0,
            high_cut_freq: 5000.0,
            low_cut_slope: Slope::Db48,
            high_cut_slope: Slope::Db36,
        };

        let params = Arc::new(EqParameters::from_settings(&a));
        let writer = {
            let params = Arc::clone(&params);
            thread::spawn(move || {
                for i in 0..20_000 {
                    params.set_settings(if i % 2 == 0 { &b } else { &a });
                }
            })
        };

        for _ in 0..20_000 {
            if let Some(seen) = params.try_snapshot() {
                assert!(seen == a || seen == b, "torn snapshot: {:?}", seen);
            }
        }
        writer.join().unwrap();

        let last = params.snapshot();
        assert!(last == a || last == b);
    }
}
