//! Magnitude Query
//!
//! Evaluates the steady-state magnitude response of installed coefficients.
//! Used for drawing response curves; never touches filter state, so it is
//! safe to call from any thread on a coefficient snapshot.

use std::f64::consts::PI;

use biquad::Coefficients;

/// Default sweep bounds for a response curve (Hz)
pub const RESPONSE_MIN_HZ: f32 = 20.0;
pub const RESPONSE_MAX_HZ: f32 = 20_000.0;

/// Anything whose net magnitude response can be queried
pub trait MagnitudeResponse {
    /// Net magnitude in dB at `frequency` Hz
    fn magnitude_db(&self, frequency: f32) -> f64;
}

/// One point of a response curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponsePoint {
    pub frequency: f32,
    pub magnitude_db: f64,
}

/// Linear magnitude |H(e^jω)| of one biquad at `frequency`
///
/// H(z) = (b0 + b1 z⁻¹ + b2 z⁻²) / (1 + a1 z⁻¹ + a2 z⁻²), evaluated on the
/// unit circle.
pub fn biquad_magnitude(c: &Coefficients<f32>, frequency: f32, sample_rate: f32) -> f64 {
    let w = 2.0 * PI * frequency as f64 / sample_rate as f64;
    let (sin_w, cos_w) = w.sin_cos();
    let (sin_2w, cos_2w) = (2.0 * w).sin_cos();

    let (b0, b1, b2) = (c.b0 as f64, c.b1 as f64, c.b2 as f64);
    let (a1, a2) = (c.a1 as f64, c.a2 as f64);

    let num_re = b0 + b1 * cos_w + b2 * cos_2w;
    let num_im = -(b1 * sin_w + b2 * sin_2w);
    let den_re = 1.0 + a1 * cos_w + a2 * cos_2w;
    let den_im = -(a1 * sin_w + a2 * sin_2w);

    ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
}

/// Map `t` in [0, 1] onto a logarithmic frequency axis
pub fn log_frequency(t: f32, min_hz: f32, max_hz: f32) -> f32 {
    min_hz * (max_hz / min_hz).powf(t)
}

/// Sample `response` at `points` log-spaced frequencies from `min_hz` to `max_hz`
///
/// Allocates; call from the UI side, not the audio callback.
pub fn response_curve<R: MagnitudeResponse + ?Sized>(
    response: &R,
    points: usize,
    min_hz: f32,
    max_hz: f32,
) -> Vec<ResponsePoint> {
    let last = points.saturating_sub(1).max(1) as f32;

    (0..points)
        .map(|i| {
            let frequency = log_frequency(i as f32 / last, min_hz, max_hz);
            ResponsePoint {
                frequency,
                magnitude_db: response.magnitude_db(frequency),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::{gain_to_db, high_pass_section, unity_coefficients};

    struct Flat;

    impl MagnitudeResponse for Flat {
        fn magnitude_db(&self, _frequency: f32) -> f64 {
            0.0
        }
    }

    #[test]
    fn test_high_pass_blocks_dc_and_passes_nyquist() {
        let c = high_pass_section(1000.0, 0.707, 48000.0);
        assert!(biquad_magnitude(&c, 0.0, 48000.0) < 1e-4);
        assert!((biquad_magnitude(&c, 24000.0, 48000.0) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_unity_magnitude() {
        let c = unity_coefficients();
        assert_eq!(gain_to_db(biquad_magnitude(&c, 440.0, 48000.0)), 0.0);
    }

    #[test]
    fn test_log_frequency_endpoints() {
        assert!((log_frequency(0.0, 20.0, 20000.0) - 20.0).abs() < 1e-3);
        assert!((log_frequency(1.0, 20.0, 20000.0) - 20000.0).abs() < 0.5);
        // Geometric midpoint of three decades
        assert!((log_frequency(0.5, 20.0, 20000.0) - 632.46).abs() < 0.1);
    }

    #[test]
    fn test_response_curve_is_log_spaced() {
        let curve = response_curve(&Flat, 4, 10.0, 10000.0);
        assert_eq!(curve.len(), 4);

        let expected = [10.0, 100.0, 1000.0, 10000.0];
        for (point, want) in curve.iter().zip(expected) {
            assert!((point.frequency - want).abs() / want < 1e-3);
            assert_eq!(point.magnitude_db, 0.0);
        }
    }

    #[test]
    fn test_response_curve_degenerate_sizes() {
        assert!(response_curve(&Flat, 0, RESPONSE_MIN_HZ, RESPONSE_MAX_HZ).is_empty());

        let single = response_curve(&Flat, 1, RESPONSE_MIN_HZ, RESPONSE_MAX_HZ);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].frequency, RESPONSE_MIN_HZ);
    }
}
