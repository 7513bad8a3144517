//! Coefficient Factory
//!
//! Pure functions turning user parameters into biquad coefficient sets.
//! Every section comes from the RBJ cookbook designs in the `biquad` crate.
//!
//! # Valid domain
//!
//! Every `freq` must lie strictly inside `(0, sample_rate / 2)` and every
//! `q` must be positive. `biquad` rejects frequencies above Nyquist and
//! negative Q, and the factories then fall back to a pass-through section.
//! Run settings through [`ChainSettings::clamped_for`] first.
//!
//! [`ChainSettings::clamped_for`]: crate::ChainSettings::clamped_for

use std::f64::consts::PI;

use biquad::{Coefficients, ToHertz, Type, Q_BUTTERWORTH_F32};
use serde::{Deserialize, Serialize};

use crate::slope::{Slope, MAX_CUT_STAGES};

/// One coefficient set per cascade stage; index `i` is cascade depth `i + 1`
pub type CutCoefficients = [Coefficients<f32>; MAX_CUT_STAGES];

/// Which side of the spectrum a cut filter removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutKind {
    /// High-pass: removes content below the cutoff
    LowCut,
    /// Low-pass: removes content above the cutoff
    HighCut,
}

/// How the four sections of a cut filter are tuned
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CutDesign {
    /// Four identical sections at a fixed Q, slope-independent.
    /// Each section is a standalone 12 dB/octave filter.
    Cascaded { q: f32 },
    /// Sections tuned to the pole pairs of a Butterworth filter of order
    /// `2 * stage_count`, maximally flat at every slope.
    Butterworth,
}

impl Default for CutDesign {
    fn default() -> Self {
        CutDesign::Butterworth
    }
}

impl CutDesign {
    /// Coefficients for all four stages of one cut filter
    pub fn cut_coefficients(
        self,
        kind: CutKind,
        freq: f32,
        slope: Slope,
        sample_rate: f32,
    ) -> CutCoefficients {
        match (self, kind) {
            (CutDesign::Cascaded { q }, CutKind::LowCut) => low_cut_coefficients(freq, q, sample_rate),
            (CutDesign::Cascaded { q }, CutKind::HighCut) => high_cut_coefficients(freq, q, sample_rate),
            (CutDesign::Butterworth, kind) => butterworth_cut_coefficients(kind, freq, slope, sample_rate),
        }
    }
}

/// Pass-through coefficients (b0 = 1, everything else 0)
pub const fn unity_coefficients() -> Coefficients<f32> {
    Coefficients {
        a1: 0.0,
        a2: 0.0,
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
    }
}

/// Convert dB gain to linear amplitude: 10^(dB/20)
#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear amplitude to dB, floored at -300 dB for silence
#[inline]
pub fn gain_to_db(gain: f64) -> f64 {
    if gain > 0.0 {
        20.0 * gain.log10()
    } else {
        -300.0
    }
}

/// Peaking EQ (bell) centred on `freq`
///
/// The gain at `freq` is exactly `gain_db`; far from it the response is flat.
pub fn peak_coefficients(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Coefficients<f32> {
    section(Type::PeakingEQ(gain_db), freq, q, sample_rate)
}

/// 2nd-order high-pass section at `freq`
pub fn high_pass_section(freq: f32, q: f32, sample_rate: f32) -> Coefficients<f32> {
    section(Type::HighPass, freq, q, sample_rate)
}

/// 2nd-order low-pass section at `freq`
pub fn low_pass_section(freq: f32, q: f32, sample_rate: f32) -> Coefficients<f32> {
    section(Type::LowPass, freq, q, sample_rate)
}

/// Four identical high-pass sections; cascading `n` of them gives `12 * n` dB/octave
pub fn low_cut_coefficients(freq: f32, q: f32, sample_rate: f32) -> CutCoefficients {
    [high_pass_section(freq, q, sample_rate); MAX_CUT_STAGES]
}

/// Four identical low-pass sections; cascading `n` of them gives `12 * n` dB/octave
pub fn high_cut_coefficients(freq: f32, q: f32, sample_rate: f32) -> CutCoefficients {
    [low_pass_section(freq, q, sample_rate); MAX_CUT_STAGES]
}

/// Q of section `stage` in a Butterworth filter of even `order`
///
/// Pole pair `k` of an order-N Butterworth prototype sits at angle
/// `(2k + 1)π / 2N` from the imaginary axis, giving `Q = 1 / (2 sin θ)`.
pub fn butterworth_stage_q(order: usize, stage: usize) -> f32 {
    let theta = (2 * stage + 1) as f64 * PI / (2 * order) as f64;
    (1.0 / (2.0 * theta.sin())) as f32
}

/// Cut filter whose active sections form a true Butterworth response for `slope`
///
/// Stages beyond `slope.stage_count()` get the single-section Butterworth
/// set so they are sane if activated before the next recompute.
pub fn butterworth_cut_coefficients(
    kind: CutKind,
    freq: f32,
    slope: Slope,
    sample_rate: f32,
) -> CutCoefficients {
    let active = slope.stage_count();
    let order = 2 * active;

    core::array::from_fn(|stage| {
        let q = if stage < active {
            butterworth_stage_q(order, stage)
        } else {
            Q_BUTTERWORTH_F32
        };
        match kind {
            CutKind::LowCut => high_pass_section(freq, q, sample_rate),
            CutKind::HighCut => low_pass_section(freq, q, sample_rate),
        }
    })
}

fn section(filter: Type<f32>, freq: f32, q: f32, sample_rate: f32) -> Coefficients<f32> {
    match Coefficients::<f32>::from_params(filter, sample_rate.hz(), freq.hz(), q) {
        Ok(coefficients) => coefficients,
        // Only reachable above Nyquist or with a negative Q, both ruled out by clamped settings
        Err(_) => unity_coefficients(),
    }
}
