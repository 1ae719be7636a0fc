//! Frequency-domain cross-correlation of channel pairs.
//!
//! For each pair `(i, j)` the cross spectrum `conj(B_i) * B_j` is phase-shifted
//! by the sub-sample part of the start-time offset, transformed back and cut
//! to `2*S+1` lags centred on zero lag.

use std::ops::Range;

use num_complex::Complex;
use rayon::prelude::*;
use tracing::debug;

use crate::combine::Combination;
use crate::config::CorrelationConfig;
use crate::error::{Result, XcorrError};
use crate::matrix::Matrix;
use crate::utils::{apply_time_shift, parabolic_peak, FftHelper};

/// Per-call constants of the correlation kernel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelParams {
    pub sampling_rate: f64,
    pub sample_to_save: usize,
    pub normalize: bool,
    pub center: bool,
    pub reference_epoch: f64,
}

impl KernelParams {
    pub fn from_config(config: &CorrelationConfig) -> Self {
        Self {
            sampling_rate: config.sampling_rate,
            sample_to_save: config.sample_to_save(),
            normalize: config.normalize_correlation,
            center: config.center_correlation,
            reference_epoch: config.reference_epoch,
        }
    }

    pub fn output_len(&self) -> usize {
        2 * self.sample_to_save + 1
    }

    /// Integer-sample part of `offset` that is reported through the start
    /// time, and the fractional remainder that is applied as a phase ramp.
    pub fn split_offset(&self, offset: f64) -> (f64, f64) {
        if self.center {
            return (0.0, 0.0);
        }
        let roffset = (offset * self.sampling_rate).trunc() / self.sampling_rate;
        (roffset, offset - roffset)
    }
}

/// One-sided spectral energy: `|B[0]|^2` plus twice every other bin,
/// Nyquist included.
pub fn spectral_energy(spectrum: &[Complex<f64>]) -> f64 {
    let Some((dc, rest)) = spectrum.split_first() else {
        return 0.0;
    };
    dc.norm_sqr() + 2.0 * rest.iter().map(|b| b.norm_sqr()).sum::<f64>()
}

pub fn check_lag_window(sample_to_save: usize, fft_len: usize) -> Result<()> {
    if sample_to_save > fft_len / 2 {
        return Err(XcorrError::LagWindowTooLong {
            sample_to_save,
            fft_len,
        });
    }
    Ok(())
}

/// Correlate one pair into `out` (length `2*S+1`) and return its start time.
///
/// `offset` is `starttime[i] - starttime[j]` in seconds.
pub fn correlate_pair(
    first: &[Complex<f64>],
    second: &[Complex<f64>],
    offset: f64,
    params: &KernelParams,
    fft: &FftHelper,
    out: &mut [f64],
) -> Result<f64> {
    let n = fft.len();
    let s = params.sample_to_save;
    check_lag_window(s, n)?;
    if out.len() != params.output_len() {
        return Err(XcorrError::ShapeMismatch {
            expected: format!("{} lags", params.output_len()),
            actual: format!("{}", out.len()),
        });
    }
    let (roffset, effective_offset) = params.split_offset(offset);
    let start = params.reference_epoch - s as f64 / params.sampling_rate - roffset;

    let norm = if params.normalize {
        spectral_energy(first).sqrt() * spectral_energy(second).sqrt() / n as f64
    } else {
        1.0
    };
    if norm == 0.0 {
        out.fill(0.0);
        return Ok(start);
    }

    let mut cross: Vec<Complex<f64>> = first
        .iter()
        .zip(second)
        .map(|(a, b)| a.conj() * b)
        .collect();
    apply_time_shift(&mut cross, n, params.sampling_rate, effective_offset);
    let mut lags = vec![0.0; n];
    fft.inverse_c2r_process(&mut cross, &mut lags)?;

    // Negative lags from the end of the circular result, then 0..=S.
    out[..s].copy_from_slice(&lags[n - s..]);
    out[s..].copy_from_slice(&lags[..=s]);
    if norm != 1.0 {
        out.iter_mut().for_each(|v| *v /= norm);
    }
    Ok(start)
}

/// Correlate the combinations in `owned`.
///
/// The returned matrix has one column per combination; columns outside
/// `owned` and their start times are zero.
pub fn correlate_owned(
    spectra: &Matrix<Complex<f64>>,
    fft: &FftHelper,
    config: &CorrelationConfig,
    owned: Range<usize>,
) -> Result<(Matrix<f64>, Vec<f64>)> {
    let params = KernelParams::from_config(config);
    check_lag_window(params.sample_to_save, fft.len())?;
    if spectra.rows() != fft.half_len() {
        return Err(XcorrError::ShapeMismatch {
            expected: format!("{} bins", fft.half_len()),
            actual: format!("{} bins", spectra.rows()),
        });
    }
    let combinations: &[Combination] = &config.combinations;
    let mut correlations = Matrix::zeros(params.output_len(), combinations.len());
    let mut start_times = vec![0.0; combinations.len()];
    if owned.end > combinations.len() {
        return Err(XcorrError::ShapeMismatch {
            expected: format!("owned pairs within 0..{}", combinations.len()),
            actual: format!("{owned:?}"),
        });
    }
    debug!(pairs = owned.len(), fft_len = fft.len(), lags = params.output_len(), "correlating");

    let starts: Vec<f64> = correlations
        .columns_mut(owned.clone())
        .into_par_iter()
        .zip(owned.clone().into_par_iter())
        .map(|(out, k)| {
            let (i, j) = combinations[k];
            let offset = config.start_times[i] - config.start_times[j];
            correlate_pair(spectra.column(i), spectra.column(j), offset, &params, fft, out)
        })
        .collect::<Result<Vec<f64>>>()?;
    start_times[owned].copy_from_slice(&starts);
    Ok((correlations, start_times))
}

/// Sub-sample lag (s) of the maximum of a correlation column.
pub fn peak_lag(column: &[f64], sampling_rate: f64) -> Option<f64> {
    if column.is_empty() {
        return None;
    }
    let center = (column.len() - 1) as f64 / 2.0;
    parabolic_peak(column).map(|idx| (idx - center) / sampling_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn spectrum(signal: &[f64], fft: &FftHelper) -> Vec<Complex<f64>> {
        let mut padded = signal.to_vec();
        padded.resize(fft.len(), 0.0);
        let mut out = vec![Complex::new(0.0, 0.0); fft.half_len()];
        fft.forward_r2c_process(&mut padded, &mut out).unwrap();
        out
    }

    fn params(fs: f64, s: usize) -> KernelParams {
        KernelParams {
            sampling_rate: fs,
            sample_to_save: s,
            normalize: true,
            center: false,
            reference_epoch: 31_536_000.0,
        }
    }

    fn gaussian(npts: usize, center: f64, width: f64) -> Vec<f64> {
        (0..npts)
            .map(|k| {
                let t = (k as f64 - center) / width;
                (-t * t).exp()
            })
            .collect()
    }

    #[test]
    fn self_correlation_peaks_at_one() {
        let mut rng = StdRng::seed_from_u64(1);
        let x: Vec<f64> = (0..300).map(|_| rng.sample(StandardNormal)).collect();
        for n in [512, 513] {
            let fft = FftHelper::new(n);
            let b = spectrum(&x, &fft);
            let p = params(10.0, 20);
            let mut out = vec![0.0; p.output_len()];
            let start = correlate_pair(&b, &b, 0.0, &p, &fft, &mut out).unwrap();
            let power: f64 = x.iter().map(|v| v * v).sum();
            assert_abs_diff_eq!(out[20], n as f64 * power / spectral_energy(&b), epsilon = 1e-12);
            assert_abs_diff_eq!(out[20], 1.0, epsilon = 2e-2);
            assert!(out.iter().all(|&v| v <= 1.0 + 1e-12));
            for k in 0..20 {
                assert_abs_diff_eq!(out[20 - k], out[20 + k], epsilon = 1e-12);
            }
            assert_abs_diff_eq!(start, 31_536_000.0 - 2.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn delayed_copy_peaks_at_its_delay() {
        let fs = 20.0;
        let x = gaussian(200, 80.0, 4.0);
        let y = gaussian(200, 87.0, 4.0);
        let fft = FftHelper::new(512);
        let p = params(fs, 30);
        let mut out = vec![0.0; p.output_len()];
        correlate_pair(&spectrum(&x, &fft), &spectrum(&y, &fft), 0.0, &p, &fft, &mut out).unwrap();
        let lag = peak_lag(&out, fs).unwrap();
        assert_abs_diff_eq!(lag, 7.0 / fs, epsilon = 1e-6);
    }

    #[test]
    fn fractional_offset_moves_start_time_by_whole_samples() {
        let fs = 10.0;
        let x_i = gaussian(256, 100.0, 8.0);
        let x_j = gaussian(256, 101.5, 8.0);
        let fft = FftHelper::new(1024);
        let (bi, bj) = (spectrum(&x_i, &fft), spectrum(&x_j, &fft));
        let s = 10;
        let offset = 1.5 / fs;

        let mut centred = params(fs, s);
        centred.center = true;
        let mut out = vec![0.0; centred.output_len()];
        let start = correlate_pair(&bi, &bj, offset, &centred, &fft, &mut out).unwrap();
        assert_abs_diff_eq!(start, 31_536_000.0 - s as f64 / fs, epsilon = 1e-9);
        assert_abs_diff_eq!(out[s + 1], out[s + 2], epsilon = 1e-9);
        assert_abs_diff_eq!(peak_lag(&out, fs).unwrap() * fs, 1.5, epsilon = 1e-2);

        let shifted = params(fs, s);
        let start = correlate_pair(&bi, &bj, offset, &shifted, &fft, &mut out).unwrap();
        assert_abs_diff_eq!(start, 31_536_000.0 - s as f64 / fs - 1.0 / fs, epsilon = 1e-9);
        assert_abs_diff_eq!(out[s], out[s + 2], epsilon = 1e-9);
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak, s + 1);
    }

    #[test]
    fn nyquist_bin_is_doubled_in_the_energy() {
        let fft = FftHelper::new(8);
        let alternating: Vec<f64> = (0..8).map(|k| if k % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let b = spectrum(&alternating, &fft);
        assert_abs_diff_eq!(spectral_energy(&b), 128.0, epsilon = 1e-9);

        let p = params(1.0, 2);
        let mut out = vec![0.0; p.output_len()];
        correlate_pair(&b, &b, 0.0, &p, &fft, &mut out).unwrap();
        assert_abs_diff_eq!(out[2], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(out[1], -0.5, epsilon = 1e-12);
    }

    #[test]
    fn zero_channel_gives_zero_column() {
        let fft = FftHelper::new(64);
        let zero = vec![Complex::new(0.0, 0.0); fft.half_len()];
        let b = spectrum(&gaussian(32, 10.0, 2.0), &fft);
        let p = params(1.0, 4);
        let mut out = vec![7.0; p.output_len()];
        correlate_pair(&zero, &b, 0.0, &p, &fft, &mut out).unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn unnormalised_keeps_raw_scale() {
        let fft = FftHelper::new(64);
        let x = vec![2.0; 8];
        let b = spectrum(&x, &fft);
        let mut p = params(1.0, 4);
        p.normalize = false;
        let mut out = vec![0.0; p.output_len()];
        correlate_pair(&b, &b, 0.0, &p, &fft, &mut out).unwrap();
        assert_abs_diff_eq!(out[4], 32.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out[0], 16.0, epsilon = 1e-9);
    }

    #[test]
    fn lag_window_longer_than_half_transform_fails() {
        let fft = FftHelper::new(16);
        let b = vec![Complex::new(1.0, 0.0); fft.half_len()];
        let p = params(1.0, 9);
        let mut out = vec![0.0; p.output_len()];
        assert_eq!(
            correlate_pair(&b, &b, 0.0, &p, &fft, &mut out),
            Err(XcorrError::LagWindowTooLong {
                sample_to_save: 9,
                fft_len: 16
            })
        );
        let p = params(1.0, 8);
        let mut out = vec![0.0; p.output_len()];
        assert!(correlate_pair(&b, &b, 0.0, &p, &fft, &mut out).is_ok());
    }

    #[test]
    fn owned_pairs_only() {
        let fft = FftHelper::new(64);
        let cols: Vec<Vec<Complex<f64>>> = (0..3)
            .map(|c| spectrum(&gaussian(32, 10.0 + c as f64, 2.0), &fft))
            .collect();
        let spectra = Matrix::from_columns(&cols).unwrap();
        let config = CorrelationConfig::new(1.0, 4.0)
            .with_start_times(vec![0.0; 3])
            .with_combinations(vec![(0, 1), (0, 2), (1, 2)]);
        let (c, t) = correlate_owned(&spectra, &fft, &config, 1..2).unwrap();
        assert_eq!(c.cols(), 3);
        assert_eq!(c.rows(), 9);
        assert!(c.column(0).iter().all(|&v| v == 0.0));
        assert!(c.column(2).iter().all(|&v| v == 0.0));
        assert!(c.column(1).iter().any(|&v| v != 0.0));
        assert_eq!(t[0], 0.0);
        assert_abs_diff_eq!(t[1], 31_536_000.0 - 4.0, epsilon = 1e-9);
    }
}
