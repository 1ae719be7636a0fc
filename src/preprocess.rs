//! Time- and frequency-domain preprocessing stages.
//!
//! Every stage mutates only the columns in `owned` and leaves the rest of
//! the matrix untouched. Owned columns are processed in parallel.

use std::ops::Range;
use std::str::FromStr;

use num_complex::Complex;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, XcorrError};
use crate::filter::{BandFilter, DEFAULT_CORNERS};
use crate::matrix::Matrix;
use crate::utils::{next_pow2, sign, std_dev, FftHelper};
use crate::window::{cosine_taper_freqs, Window};

/// Values a stage may need besides the data.
pub struct StageContext<'a> {
    pub sampling_rate: f64,
    pub length_to_save: f64,
    /// Bin frequencies of the spectrum matrix; empty for time-domain stages
    pub freqs: &'a [f64],
    /// Transform of the padded length; required by [`FdStage::FdSignBit`]
    pub fft: Option<&'a FftHelper>,
}

impl<'a> StageContext<'a> {
    pub fn time_domain(sampling_rate: f64, length_to_save: f64) -> Self {
        Self {
            sampling_rate,
            length_to_save,
            freqs: &[],
            fft: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Detrend {
    Constant,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TdStage {
    Detrend(Detrend),
    Taper(Window),
    Filter(BandFilter),
    /// Divide by the square root of the smoothed (optionally filtered) power.
    TdNormalization {
        window_length: f64,
        filter: Option<BandFilter>,
    },
    Clip { std_factor: f64 },
    SignBit,
    StdNormalization,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FdStage {
    SpectralWhitening,
    FdTaper { flimit: [f64; 4] },
    FdSignBit,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ZeroPadding {
    NextPowerOfTwo,
    AvoidWrapAround,
    #[default]
    AvoidWrapPowerTwo,
}

impl ZeroPadding {
    /// Transform length for `npts` input samples.
    pub fn padded_len(&self, npts: usize, sampling_rate: f64, length_to_save: f64) -> usize {
        let guard = (sampling_rate * length_to_save).ceil().max(0.0) as usize;
        match self {
            ZeroPadding::NextPowerOfTwo => next_pow2(npts),
            ZeroPadding::AvoidWrapAround => npts + guard,
            ZeroPadding::AvoidWrapPowerTwo => next_pow2(npts + guard),
        }
    }
}

impl FromStr for ZeroPadding {
    type Err = XcorrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "nextPowerOfTwo" | "next-power-of-two" => Ok(Self::NextPowerOfTwo),
            "avoidWrapAround" | "avoid-wrap-around" => Ok(Self::AvoidWrapAround),
            "avoidWrapPowerTwo" | "avoid-wrap-power-two" => Ok(Self::AvoidWrapPowerTwo),
            other => Err(XcorrError::UnsupportedZeroPadding(other.to_string())),
        }
    }
}

fn owned_columns<'m, T>(data: &'m mut Matrix<T>, owned: &Range<usize>) -> Result<Vec<&'m mut [T]>> {
    if owned.end > data.cols() || owned.start > owned.end {
        return Err(XcorrError::ShapeMismatch {
            expected: format!("owned columns within 0..{}", data.cols()),
            actual: format!("{owned:?}"),
        });
    }
    Ok(data.columns_mut(owned.clone()))
}

impl TdStage {
    pub fn name(&self) -> &'static str {
        match self {
            TdStage::Detrend(_) => "detrend",
            TdStage::Taper(_) => "taper",
            TdStage::Filter(f) => f.name(),
            TdStage::TdNormalization { .. } => "tdnorm",
            TdStage::Clip { .. } => "clip",
            TdStage::SignBit => "signbit",
            TdStage::StdNormalization => "stdnorm",
        }
    }

    pub fn apply(&self, data: &mut Matrix<f64>, owned: Range<usize>, ctx: &StageContext<'_>) -> Result<()> {
        let npts = data.rows();
        let columns = owned_columns(data, &owned)?;
        debug!(stage = self.name(), columns = columns.len(), npts, "time-domain stage");
        match *self {
            TdStage::Detrend(Detrend::Constant) => columns.into_par_iter().for_each(detrend_constant),
            TdStage::Detrend(Detrend::Linear) => columns.into_par_iter().for_each(detrend_linear),
            TdStage::Taper(window) => {
                let win = window.generate(npts)?;
                columns.into_par_iter().for_each(|col| {
                    col.iter_mut().zip(&win).for_each(|(x, w)| *x *= w);
                });
            }
            TdStage::Filter(filter) => {
                let sos = filter.design(ctx.sampling_rate)?;
                columns.into_par_iter().for_each(|col| filter.apply(&sos, col));
            }
            TdStage::TdNormalization { window_length, filter } => {
                if !(window_length > 0.0) {
                    return Err(XcorrError::stage_arg("tdnorm", "window length must be positive"));
                }
                let len = (window_length * ctx.sampling_rate).ceil() as usize;
                let envelope_filter = filter
                    .as_ref()
                    .map(|f| f.design(ctx.sampling_rate).map(|sos| (f, sos)))
                    .transpose()?;
                columns.into_par_iter().for_each(|col| {
                    let mut envelope = col.to_vec();
                    if let Some((filter, sos)) = &envelope_filter {
                        filter.apply(sos, &mut envelope);
                    }
                    envelope.iter_mut().for_each(|v| *v *= *v);
                    let mut smooth = moving_average_same(&envelope, len);
                    smooth.reverse();
                    let mut smooth = moving_average_same(&smooth, len);
                    smooth.reverse();
                    let floor = smooth.iter().copied().fold(f64::NEG_INFINITY, f64::max) * 1e-6;
                    for (x, s) in col.iter_mut().zip(&smooth) {
                        let scale = (s + floor).sqrt();
                        if scale > 0.0 {
                            *x /= scale;
                        }
                    }
                });
            }
            TdStage::Clip { std_factor } => {
                if !(std_factor >= 0.0) {
                    return Err(XcorrError::stage_arg("clip", "std factor must be non-negative"));
                }
                columns.into_par_iter().for_each(|col| {
                    let limit = std_factor * std_dev(col);
                    for x in col.iter_mut() {
                        if *x > limit {
                            *x = limit;
                        } else if *x < -limit {
                            *x = -limit;
                        }
                    }
                });
            }
            TdStage::SignBit => columns.into_par_iter().for_each(|col| {
                col.iter_mut().for_each(|x| *x = sign(*x));
            }),
            TdStage::StdNormalization => columns.into_par_iter().for_each(|col| {
                let std = std_dev(col);
                if std > 0.0 {
                    col.iter_mut().for_each(|x| *x /= std);
                }
            }),
        }
        Ok(())
    }
}

impl FdStage {
    pub fn name(&self) -> &'static str {
        match self {
            FdStage::SpectralWhitening => "whiten",
            FdStage::FdTaper { .. } => "fdtaper",
            FdStage::FdSignBit => "fdsignbit",
        }
    }

    pub fn apply(
        &self,
        data: &mut Matrix<Complex<f64>>,
        owned: Range<usize>,
        ctx: &StageContext<'_>,
    ) -> Result<()> {
        let bins = data.rows();
        let columns = owned_columns(data, &owned)?;
        debug!(stage = self.name(), columns = columns.len(), bins, "frequency-domain stage");
        match *self {
            FdStage::SpectralWhitening => columns.into_par_iter().for_each(|col| {
                for z in col.iter_mut() {
                    let mag = z.norm();
                    if mag > 0.0 {
                        *z /= mag;
                    }
                }
            }),
            FdStage::FdTaper { flimit } => {
                if ctx.freqs.len() != bins {
                    return Err(XcorrError::ShapeMismatch {
                        expected: format!("{bins} bin frequencies"),
                        actual: format!("{}", ctx.freqs.len()),
                    });
                }
                let taper = cosine_taper_freqs(ctx.freqs, flimit)?;
                columns.into_par_iter().for_each(|col| {
                    col.iter_mut().zip(&taper).for_each(|(z, w)| *z *= *w);
                });
            }
            FdStage::FdSignBit => {
                let fft = ctx
                    .fft
                    .ok_or_else(|| XcorrError::InvalidConfig("fdsignbit needs the padded transform".into()))?;
                if fft.half_len() != bins {
                    return Err(XcorrError::ShapeMismatch {
                        expected: format!("{} bins", fft.half_len()),
                        actual: format!("{bins} bins"),
                    });
                }
                columns.into_par_iter().try_for_each(|col| -> Result<()> {
                    let mut spectrum = col.to_vec();
                    let mut signal = vec![0.0; fft.len()];
                    fft.inverse_c2r_process(&mut spectrum, &mut signal)?;
                    signal.iter_mut().for_each(|x| *x = sign(*x));
                    fft.forward_r2c_process(&mut signal, col)
                })?;
            }
        }
        Ok(())
    }
}

pub fn apply_td_stages(
    stages: &[TdStage],
    data: &mut Matrix<f64>,
    owned: Range<usize>,
    ctx: &StageContext<'_>,
) -> Result<()> {
    stages.iter().try_for_each(|stage| stage.apply(data, owned.clone(), ctx))
}

pub fn apply_fd_stages(
    stages: &[FdStage],
    data: &mut Matrix<Complex<f64>>,
    owned: Range<usize>,
    ctx: &StageContext<'_>,
) -> Result<()> {
    stages.iter().try_for_each(|stage| stage.apply(data, owned.clone(), ctx))
}

fn detrend_constant(col: &mut [f64]) {
    if col.is_empty() {
        return;
    }
    let m = col.iter().sum::<f64>() / col.len() as f64;
    col.iter_mut().for_each(|x| *x -= m);
}

/// Subtract the least-squares line through `(index, value)`.
fn detrend_linear(col: &mut [f64]) {
    let n = col.len();
    if n == 0 {
        return;
    }
    let t_mean = (n - 1) as f64 / 2.0;
    let x_mean = col.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, x) in col.iter().enumerate() {
        let dt = i as f64 - t_mean;
        sxy += dt * (x - x_mean);
        sxx += dt * dt;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    for (i, x) in col.iter_mut().enumerate() {
        *x -= x_mean + slope * (i as f64 - t_mean);
    }
}

/// Boxcar mean of length `len`, output aligned like a centred ("same")
/// convolution: sample `i` averages `x[i + (len-1)/2 - len + 1 ..= i + (len-1)/2]`.
pub fn moving_average_same(x: &[f64], len: usize) -> Vec<f64> {
    let n = x.len();
    let len = len.max(1);
    let offset = (len - 1) / 2;
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for v in x {
        acc += v;
        prefix.push(acc);
    }
    (0..n)
        .map(|i| {
            let hi = (i + offset + 1).min(n);
            let lo = (i + offset + 1).saturating_sub(len).min(hi);
            (prefix[hi] - prefix[lo]) / len as f64
        })
        .collect()
}

fn parse_f64(stage: &str, token: &str) -> Result<f64> {
    token
        .trim()
        .parse::<f64>()
        .map_err(|_| XcorrError::stage_arg(stage, format!("'{token}' is not a number")))
}

/// `bandpass:fmin:fmax[:corners][:zerophase]`, `lowpass:f[...]`, `highpass:f[...]`
fn parse_filter(name: &str, args: &[&str]) -> Result<BandFilter> {
    let needed = if name == "bandpass" { 2 } else { 1 };
    if args.len() < needed {
        return Err(XcorrError::stage_arg(name, format!("expected {needed} corner frequencies")));
    }
    let mut filter = match name {
        "bandpass" => BandFilter::bandpass(parse_f64(name, args[0])?, parse_f64(name, args[1])?),
        "lowpass" => BandFilter::lowpass(parse_f64(name, args[0])?),
        "highpass" => BandFilter::highpass(parse_f64(name, args[0])?),
        other => return Err(XcorrError::UnknownStage(other.to_string())),
    };
    let mut corners = DEFAULT_CORNERS;
    for token in &args[needed..] {
        if token.eq_ignore_ascii_case("zerophase") {
            filter = filter.with_zerophase(true);
        } else {
            corners = token
                .parse::<usize>()
                .map_err(|_| XcorrError::stage_arg(name, format!("bad option '{token}'")))?;
        }
    }
    Ok(filter.with_corners(corners))
}

impl FromStr for TdStage {
    type Err = XcorrError;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.trim().split(':').collect();
        let (name, args) = (tokens[0], &tokens[1..]);
        match name {
            "detrend" | "demean" => {
                let kind = match (name, args.first().copied()) {
                    ("demean", None) => Detrend::Constant,
                    (_, None) | (_, Some("linear")) | (_, Some("detrend")) => Detrend::Linear,
                    (_, Some("constant")) | (_, Some("demean")) => Detrend::Constant,
                    (_, Some(other)) => {
                        return Err(XcorrError::stage_arg("detrend", format!("unknown type '{other}'")))
                    }
                };
                Ok(TdStage::Detrend(kind))
            }
            "taper" => {
                let window = match args.first().copied() {
                    Some("cosine") | Some("cosTaper") => {
                        let p = match args.get(1) {
                            Some(token) => parse_f64("taper", token)?,
                            None => 0.1,
                        };
                        if !(0.0..=1.0).contains(&p) {
                            return Err(XcorrError::stage_arg("taper", format!("fraction {p} outside [0, 1]")));
                        }
                        Window::Cosine { p }
                    }
                    Some("hann") | Some("hanning") => Window::Hann,
                    Some("hamming") => Window::Hamming,
                    Some("blackman") => Window::Blackman,
                    Some(other) => {
                        return Err(XcorrError::stage_arg("taper", format!("unknown window '{other}'")))
                    }
                    None => return Err(XcorrError::stage_arg("taper", "missing window type")),
                };
                Ok(TdStage::Taper(window))
            }
            "bandpass" | "lowpass" | "highpass" => Ok(TdStage::Filter(parse_filter(name, args)?)),
            "tdnorm" => {
                let window_length = match args.first() {
                    Some(token) => parse_f64("tdnorm", token)?,
                    None => return Err(XcorrError::stage_arg("tdnorm", "missing window length")),
                };
                if !(window_length > 0.0) {
                    return Err(XcorrError::stage_arg("tdnorm", "window length must be positive"));
                }
                let filter = match args.get(1) {
                    Some(kind) => Some(parse_filter(kind, &args[2..])?),
                    None => None,
                };
                Ok(TdStage::TdNormalization { window_length, filter })
            }
            "clip" => {
                let std_factor = match args.first() {
                    Some(token) => parse_f64("clip", token)?,
                    None => return Err(XcorrError::stage_arg("clip", "missing std factor")),
                };
                if !(std_factor >= 0.0) {
                    return Err(XcorrError::stage_arg("clip", "std factor must be non-negative"));
                }
                Ok(TdStage::Clip { std_factor })
            }
            "signbit" => Ok(TdStage::SignBit),
            "stdnorm" => Ok(TdStage::StdNormalization),
            other => Err(XcorrError::UnknownStage(other.to_string())),
        }
    }
}

impl FromStr for FdStage {
    type Err = XcorrError;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.trim().split(':').collect();
        match tokens[0] {
            "whiten" | "whitening" => Ok(FdStage::SpectralWhitening),
            "fdsignbit" => Ok(FdStage::FdSignBit),
            "fdtaper" => {
                if tokens.len() != 5 {
                    return Err(XcorrError::stage_arg("fdtaper", "expected four corner frequencies"));
                }
                let mut flimit = [0.0; 4];
                for (slot, token) in flimit.iter_mut().zip(&tokens[1..]) {
                    *slot = parse_f64("fdtaper", token)?;
                }
                if flimit.windows(2).any(|w| w[0] > w[1]) {
                    return Err(XcorrError::stage_arg("fdtaper", "corner frequencies must be ascending"));
                }
                Ok(FdStage::FdTaper { flimit })
            }
            other => Err(XcorrError::UnknownStage(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{mean, rfft_freqs};
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn noise_matrix(rows: usize, cols: usize, seed: u64) -> Matrix<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..rows * cols).map(|_| rng.sample::<f64, _>(StandardNormal) + 0.3).collect();
        Matrix::from_col_major(rows, cols, data).unwrap()
    }

    #[test]
    fn every_td_stage_respects_ownership() {
        let stages = [
            "detrend:linear",
            "demean",
            "taper:cosine:0.2",
            "taper:hann",
            "bandpass:1:10:4:zerophase",
            "lowpass:5",
            "tdnorm:0.5",
            "tdnorm:0.5:bandpass:2:8",
            "clip:1.5",
            "signbit",
            "stdnorm",
        ];
        let ctx = StageContext::time_domain(50.0, 1.0);
        for spec in stages {
            let stage: TdStage = spec.parse().unwrap();
            let original = noise_matrix(256, 5, 7);
            let mut data = original.clone();
            stage.apply(&mut data, 1..3, &ctx).unwrap();
            for j in [0, 3, 4] {
                assert_eq!(data.column(j), original.column(j), "{spec} touched column {j}");
            }
            assert_ne!(data.column(1), original.column(1), "{spec} left column 1 unchanged");
        }
    }

    #[test]
    fn every_fd_stage_respects_ownership() {
        let n = 64;
        let fft = FftHelper::new(n);
        let freqs = rfft_freqs(n, 10.0);
        let ctx = StageContext {
            sampling_rate: 10.0,
            length_to_save: 1.0,
            freqs: &freqs,
            fft: Some(&fft),
        };
        let td = noise_matrix(n, 4, 3);
        let mut spec = Matrix::<Complex<f64>>::zeros(n / 2 + 1, 4);
        for j in 0..4 {
            let mut scratch = td.column(j).to_vec();
            fft.forward_r2c_process(&mut scratch, spec.column_mut(j)).unwrap();
        }
        for stage in ["whiten", "fdtaper:0.5:1:3:4", "fdsignbit"] {
            let stage: FdStage = stage.parse().unwrap();
            let mut data = spec.clone();
            stage.apply(&mut data, 2..4, &ctx).unwrap();
            assert_eq!(data.column(0), spec.column(0));
            assert_eq!(data.column(1), spec.column(1));
            assert_ne!(data.column(2), spec.column(2));
        }
    }

    #[test]
    fn detrend_removes_line() {
        let mut m = Matrix::from_columns(&[(0..50).map(|i| 3.0 + 0.25 * i as f64).collect::<Vec<_>>()]).unwrap();
        TdStage::Detrend(Detrend::Linear)
            .apply(&mut m, 0..1, &StageContext::time_domain(1.0, 0.0))
            .unwrap();
        assert!(m.column(0).iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn clip_bounds_by_population_std() {
        let mut m = Matrix::from_columns(&[vec![1.0, -1.0, 1.0, -1.0, 10.0, -10.0]]).unwrap();
        let limit = 0.5 * std_dev(m.column(0));
        TdStage::Clip { std_factor: 0.5 }
            .apply(&mut m, 0..1, &StageContext::time_domain(1.0, 0.0))
            .unwrap();
        assert!(m.column(0).iter().all(|v| v.abs() <= limit + 1e-15));
        assert_eq!(m.column(0)[4], limit);
    }

    #[test]
    fn signbit_maps_zero_to_zero() {
        let mut m = Matrix::from_columns(&[vec![0.0, 2.0, -0.5]]).unwrap();
        TdStage::SignBit
            .apply(&mut m, 0..1, &StageContext::time_domain(1.0, 0.0))
            .unwrap();
        assert_eq!(m.column(0), &[0.0, 1.0, -1.0]);
    }

    #[test]
    fn stdnorm_gives_unit_deviation_and_skips_flat_columns() {
        let m = noise_matrix(500, 1, 11);
        let flat = vec![4.0; 500];
        let mut both = Matrix::from_columns(&[m.column(0).to_vec(), flat.clone()]).unwrap();
        TdStage::StdNormalization
            .apply(&mut both, 0..2, &StageContext::time_domain(1.0, 0.0))
            .unwrap();
        assert_abs_diff_eq!(std_dev(both.column(0)), 1.0, epsilon = 1e-12);
        assert_eq!(both.column(1), flat.as_slice());
    }

    #[test]
    fn filter_stage_matches_designed_cascade() {
        let filter = BandFilter::bandpass(1.0, 8.0).with_zerophase(true);
        let original = noise_matrix(300, 2, 9);
        let mut data = original.clone();
        TdStage::Filter(filter)
            .apply(&mut data, 1..2, &StageContext::time_domain(40.0, 0.0))
            .unwrap();
        let mut expected = original.column(1).to_vec();
        filter.apply(&filter.design(40.0).unwrap(), &mut expected);
        assert_eq!(data.column(1), expected.as_slice());
        assert_eq!(data.column(0), original.column(0));
    }

    #[test]
    fn tdnorm_is_scale_invariant() {
        let ctx = StageContext::time_domain(20.0, 0.0);
        let stage = TdStage::TdNormalization {
            window_length: 1.0,
            filter: None,
        };
        let mut a = noise_matrix(400, 1, 5);
        let mut b = Matrix::from_columns(&[a.column(0).iter().map(|v| v * 1000.0).collect::<Vec<_>>()]).unwrap();
        stage.apply(&mut a, 0..1, &ctx).unwrap();
        stage.apply(&mut b, 0..1, &ctx).unwrap();
        for (x, y) in a.column(0).iter().zip(b.column(0)) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-9);
        }
    }

    #[test]
    fn moving_average_matches_centred_convolution() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        // np.convolve(x, ones(3)/3, 'same')
        let y = moving_average_same(&x, 3);
        let expected = [1.0, 2.0, 3.0, 4.0, 3.0];
        for (a, b) in y.iter().zip(expected) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-12);
        }
        // even length: np.convolve(x, ones(2)/2, 'same') == [0.5, 1.5, 2.5, 3.5, 4.5]
        let y = moving_average_same(&x, 2);
        assert_abs_diff_eq!(y[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(y[4], 4.5, epsilon = 1e-12);
        assert_abs_diff_eq!(mean(&moving_average_same(&[2.0; 8], 4)[2..6]), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn whitening_keeps_zero_bins() {
        let mut m = Matrix::from_columns(&[vec![Complex::new(3.0, 4.0), Complex::new(0.0, 0.0)]]).unwrap();
        let ctx = StageContext::time_domain(1.0, 0.0);
        FdStage::SpectralWhitening.apply(&mut m, 0..1, &ctx).unwrap();
        assert_eq!(m.column(0)[0], Complex::new(0.6, 0.8));
        assert_eq!(m.column(0)[1], Complex::new(0.0, 0.0));
    }

    #[test]
    fn fdsignbit_needs_transform() {
        let mut m = Matrix::<Complex<f64>>::zeros(5, 1);
        let ctx = StageContext::time_domain(1.0, 0.0);
        assert!(FdStage::FdSignBit.apply(&mut m, 0..1, &ctx).is_err());
    }

    #[test]
    fn padding_modes() {
        assert_eq!(ZeroPadding::NextPowerOfTwo.padded_len(1000, 10.0, 5.0), 1024);
        assert_eq!(ZeroPadding::AvoidWrapAround.padded_len(1000, 10.0, 5.0), 1050);
        assert_eq!(ZeroPadding::AvoidWrapPowerTwo.padded_len(1000, 10.0, 5.0), 2048);
        assert_eq!(ZeroPadding::default(), ZeroPadding::AvoidWrapPowerTwo);
        assert_eq!("avoidWrapAround".parse::<ZeroPadding>().unwrap(), ZeroPadding::AvoidWrapAround);
        assert_eq!(
            "fancy".parse::<ZeroPadding>(),
            Err(XcorrError::UnsupportedZeroPadding("fancy".into()))
        );
    }

    #[test]
    fn stage_parsing() {
        assert_eq!("detrend".parse::<TdStage>().unwrap(), TdStage::Detrend(Detrend::Linear));
        assert_eq!("detrend:constant".parse::<TdStage>().unwrap(), TdStage::Detrend(Detrend::Constant));
        assert_eq!(
            "taper:cosine:0.05".parse::<TdStage>().unwrap(),
            TdStage::Taper(Window::Cosine { p: 0.05 })
        );
        assert_eq!(
            "bandpass:1:3:4:zerophase".parse::<TdStage>().unwrap(),
            TdStage::Filter(BandFilter::bandpass(1.0, 3.0).with_corners(4).with_zerophase(true))
        );
        assert_eq!(
            "lowpass:2".parse::<TdStage>().unwrap(),
            TdStage::Filter(BandFilter::lowpass(2.0))
        );
        assert_eq!(
            "tdnorm:1.0".parse::<TdStage>().unwrap(),
            TdStage::TdNormalization {
                window_length: 1.0,
                filter: None
            }
        );
        assert_eq!("clip:3".parse::<TdStage>().unwrap(), TdStage::Clip { std_factor: 3.0 });
        assert_eq!(
            "fdtaper:0.5:1:5:7".parse::<FdStage>().unwrap(),
            FdStage::FdTaper {
                flimit: [0.5, 1.0, 5.0, 7.0]
            }
        );
        assert_eq!("whiten".parse::<FdStage>().unwrap(), FdStage::SpectralWhitening);

        assert_eq!("wobble".parse::<TdStage>(), Err(XcorrError::UnknownStage("wobble".into())));
        assert_eq!("signbit".parse::<FdStage>(), Err(XcorrError::UnknownStage("signbit".into())));
        assert!(matches!(
            "clip:x".parse::<TdStage>(),
            Err(XcorrError::InvalidStageArgument { .. })
        ));
        assert!("taper:cosine:2".parse::<TdStage>().is_err());
        assert!("fdtaper:3:2:1:0".parse::<FdStage>().is_err());
        assert!("bandpass:1".parse::<TdStage>().is_err());
        assert!("tdnorm:0".parse::<TdStage>().is_err());
    }
}
