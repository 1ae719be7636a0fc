use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

use num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use tracing::debug;

use crate::error::{Result, XcorrError};

/// Forward/inverse real FFT plans of one length.
pub struct FftHelper {
    len: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
}

impl FftHelper {
    pub fn new(len: usize) -> Self {
        let mut planner = RealFftPlanner::new();
        Self {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn half_len(&self) -> usize {
        self.len / 2 + 1
    }

    /// Unnormalised forward transform. `input` is used as scratch.
    pub fn forward_r2c_process(
        &self,
        input: &mut [f64],
        output: &mut [Complex<f64>],
    ) -> Result<()> {
        if input.len() != self.len {
            return Err(XcorrError::ShapeMismatch {
                expected: format!("{} samples for R2C", self.len),
                actual: format!("{} samples", input.len()),
            });
        }
        if output.len() != self.half_len() {
            return Err(XcorrError::ShapeMismatch {
                expected: format!("{} bins for R2C output", self.half_len()),
                actual: format!("{} bins", output.len()),
            });
        }
        self.forward.process(input, output)?;
        Ok(())
    }

    /// Inverse transform scaled by `1/len`. `spectrum` is used as scratch.
    pub fn inverse_c2r_process(
        &self,
        spectrum: &mut [Complex<f64>],
        output: &mut [f64],
    ) -> Result<()> {
        if spectrum.len() != self.half_len() {
            return Err(XcorrError::ShapeMismatch {
                expected: format!("{} bins for C2R", self.half_len()),
                actual: format!("{} bins", spectrum.len()),
            });
        }
        if output.len() != self.len {
            return Err(XcorrError::ShapeMismatch {
                expected: format!("{} samples for C2R output", self.len),
                actual: format!("{} samples", output.len()),
            });
        }
        // A real signal has purely real DC and Nyquist bins.
        spectrum[0].im = 0.0;
        if self.len % 2 == 0 {
            spectrum[self.len / 2].im = 0.0;
        }
        self.inverse.process(spectrum, output)?;
        let scale = 1.0 / self.len as f64;
        for value in output.iter_mut() {
            *value *= scale;
        }
        Ok(())
    }
}

/// Plans keyed by transform length, reused across correlation calls.
///
/// Owned by an [`crate::Engine`]; shared by all workers of a local group.
#[derive(Default)]
pub struct FftCache {
    plans: Mutex<HashMap<usize, Arc<FftHelper>>>,
}

impl FftCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn helper(&self, len: usize) -> Arc<FftHelper> {
        let mut plans = self.plans.lock().unwrap_or_else(|e| e.into_inner());
        plans
            .entry(len)
            .or_insert_with(|| {
                debug!(len, "planning real FFT");
                Arc::new(FftHelper::new(len))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.plans.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Linear phase ramp: bin `k` is multiplied by `step^k`, accumulated with
/// a complex recurrence. The Nyquist bin of an even transform stays real.
pub fn phase_ramp(spectrum: &mut [Complex<f64>], fft_len: usize, step: Complex<f64>) {
    spectrum.iter_mut().fold(Complex::new(1.0, 0.0), |phasor, bin| {
        *bin *= phasor;
        phasor * step
    });
    if fft_len % 2 == 0 {
        if let Some(nyquist) = spectrum.get_mut(fft_len / 2) {
            nyquist.im = 0.0;
        }
    }
}

/// Advance the signal by `shift_seconds`: bin at frequency `f` is
/// multiplied by `exp(i*2*pi*f*shift)`.
pub fn apply_time_shift(
    spectrum: &mut [Complex<f64>],
    fft_len: usize,
    sampling_rate: f64,
    shift_seconds: f64,
) {
    if shift_seconds == 0.0 {
        return;
    }
    let freq_step_hz = sampling_rate / fft_len as f64;
    let step = Complex::from_polar(1.0, 2.0 * PI * freq_step_hz * shift_seconds);
    phase_ramp(spectrum, fft_len, step);
}

/// Frequencies of the one-sided spectrum bins of an `n`-point transform.
pub fn rfft_freqs(n: usize, sampling_rate: f64) -> Vec<f64> {
    let df = sampling_rate / n as f64;
    (0..n / 2 + 1).map(|k| k as f64 * df).collect()
}

pub fn next_pow2(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Sign with `sign(0) == 0`, unlike `f64::signum`.
#[inline]
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let variance = data
        .iter()
        .map(|value| {
            let diff = value - m;
            diff * diff
        })
        .sum::<f64>()
        / data.len() as f64;
    variance.sqrt()
}

/// Sub-sample location of the maximum via a parabola through the peak
/// and its neighbours. Returns the fractional index.
pub fn parabolic_peak(data: &[f64]) -> Option<f64> {
    let (idx, _) = data
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))?;
    if idx == 0 || idx + 1 >= data.len() {
        return Some(idx as f64);
    }
    let (y0, y1, y2) = (data[idx - 1], data[idx], data[idx + 1]);
    let denom = y0 - 2.0 * y1 + y2;
    if denom.abs() < f64::EPSILON {
        return Some(idx as f64);
    }
    Some(idx as f64 + 0.5 * (y0 - y2) / denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_inverse_restores_signal() {
        let helper = FftHelper::new(16);
        let signal: Vec<f64> = (0..16).map(|i| (i as f64 * 0.7).sin() + 0.1 * i as f64).collect();
        let mut scratch = signal.clone();
        let mut spec = vec![Complex::new(0.0, 0.0); helper.half_len()];
        helper.forward_r2c_process(&mut scratch, &mut spec).unwrap();
        let mut back = vec![0.0; 16];
        helper.inverse_c2r_process(&mut spec, &mut back).unwrap();
        for (a, b) in signal.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn helper_rejects_wrong_lengths() {
        let helper = FftHelper::new(8);
        let mut input = vec![0.0; 7];
        let mut output = vec![Complex::new(0.0, 0.0); 5];
        assert!(helper.forward_r2c_process(&mut input, &mut output).is_err());
    }

    #[test]
    fn cache_reuses_plans() {
        let cache = FftCache::new();
        let a = cache.helper(64);
        let b = cache.helper(64);
        assert!(Arc::ptr_eq(&a, &b));
        cache.helper(128);
        assert_eq!(cache.len(), 2);
        assert!(!cache.is_empty());
    }

    #[test]
    fn phase_ramp_matches_direct_evaluation() {
        let n = 32;
        let fs = 10.0;
        let shift = 0.037;
        let mut spec = vec![Complex::new(1.0, 0.5); n / 2 + 1];
        apply_time_shift(&mut spec, n, fs, shift);
        for (k, value) in spec.iter().enumerate().take(n / 2) {
            let f = k as f64 * fs / n as f64;
            let expected = Complex::new(1.0, 0.5) * Complex::from_polar(1.0, 2.0 * PI * f * shift);
            assert!((value - expected).norm() < 1e-12, "bin {k}");
        }
        assert_eq!(spec[n / 2].im, 0.0);
    }

    #[test]
    fn sign_of_zero_is_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-0.0), 0.0);
        assert_eq!(sign(-3.0), -1.0);
        assert_eq!(sign(2.5), 1.0);
    }

    #[test]
    fn rfft_freqs_include_nyquist() {
        let f = rfft_freqs(8, 100.0);
        assert_eq!(f.len(), 5);
        assert_eq!(f[4], 50.0);
    }

    #[test]
    fn parabolic_peak_recovers_offset() {
        // Samples of -(x - 2.3)^2 at integer x
        let data: Vec<f64> = (0..6).map(|x| -((x as f64 - 2.3).powi(2))).collect();
        let peak = parabolic_peak(&data).unwrap();
        assert!((peak - 2.3).abs() < 1e-12);
    }

    #[test]
    fn population_std() {
        assert!((std_dev(&[1.0, -1.0, 1.0, -1.0]) - 1.0).abs() < 1e-15);
        assert_eq!(std_dev(&[]), 0.0);
    }
}
