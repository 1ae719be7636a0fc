//! Taper windows for time series and spectra.

use std::f64::consts::PI;

use crate::error::{Result, XcorrError};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Window {
    /// Half-cosine split taper; `p` is the tapered fraction of the whole
    /// window, half at each end.
    Cosine { p: f64 },
    Hann,
    Hamming,
    Blackman,
}

impl Window {
    /// Window coefficients for `npts` samples.
    pub fn generate(&self, npts: usize) -> Result<Vec<f64>> {
        match *self {
            Window::Cosine { p } => cosine_taper(npts, p),
            Window::Hann => Ok(symmetric(npts, |x| 0.5 - 0.5 * x.cos())),
            Window::Hamming => Ok(symmetric(npts, |x| 0.54 - 0.46 * x.cos())),
            Window::Blackman => Ok(symmetric(npts, |x| {
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })),
        }
    }
}

/// Generalized cosine window evaluated at `2*pi*n/(npts-1)`.
fn symmetric(npts: usize, f: impl Fn(f64) -> f64) -> Vec<f64> {
    match npts {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (npts - 1) as f64;
            (0..npts).map(|n| f(2.0 * PI * n as f64 / denom)).collect()
        }
    }
}

/// Cosine taper over `npts` samples. A fraction `p` in `[0, 1]` of the
/// window is tapered, split evenly between both ends.
pub fn cosine_taper(npts: usize, p: f64) -> Result<Vec<f64>> {
    if !(0.0..=1.0).contains(&p) {
        return Err(XcorrError::stage_arg("taper", format!("fraction {p} outside [0, 1]")));
    }
    if npts == 0 {
        return Ok(Vec::new());
    }
    let frac = (npts as f64 * p / 2.0 + 0.5) as isize;
    let n = npts as isize;
    Ok(split_cosine(npts, [0, frac - 1, n - frac, n - 1]))
}

/// Cosine taper over a frequency axis: zero below `f1`, rising to one at
/// `f2`, flat to `f3`, falling to zero at `f4`. Each corner snaps to the
/// nearest bin.
pub fn cosine_taper_freqs(freqs: &[f64], flimit: [f64; 4]) -> Result<Vec<f64>> {
    if flimit.windows(2).any(|w| w[0] > w[1]) || flimit.iter().any(|f| !f.is_finite()) {
        return Err(XcorrError::stage_arg(
            "fdtaper",
            format!("corner frequencies {flimit:?} must be finite and ascending"),
        ));
    }
    if freqs.is_empty() {
        return Ok(Vec::new());
    }
    let nearest = |target: f64| -> isize {
        freqs
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - target).abs().total_cmp(&(b.1 - target).abs()))
            .map_or(0, |(idx, _)| idx as isize)
    };
    Ok(split_cosine(
        freqs.len(),
        [nearest(flimit[0]), nearest(flimit[1]), nearest(flimit[2]), nearest(flimit[3])],
    ))
}

/// Rise over `idx[0]..=idx[1]`, one until `idx[2]`, fall over `idx[2]..=idx[3]`.
fn split_cosine(npts: usize, idx: [isize; 4]) -> Vec<f64> {
    let [idx1, mut idx2, mut idx3, idx4] = idx;
    // Degenerate ramps would divide by zero.
    if idx1 == idx2 {
        idx2 += 1;
    }
    if idx3 == idx4 {
        idx3 -= 1;
    }
    let n = npts as isize;
    let clamp = |i: isize| i.clamp(0, n);
    let mut win = vec![0.0; npts];
    for i in clamp(idx1)..clamp(idx2 + 1) {
        win[i as usize] = 0.5 * (1.0 - (PI * (i - idx1) as f64 / (idx2 - idx1) as f64).cos());
    }
    for i in clamp(idx2 + 1)..clamp(idx3) {
        win[i as usize] = 1.0;
    }
    for i in clamp(idx3)..clamp(idx4 + 1) {
        win[i as usize] = 0.5 * (1.0 + (PI * (idx3 - i) as f64 / (idx4 - idx3) as f64).cos());
    }
    win
}
