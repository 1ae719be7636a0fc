//! Butterworth IIR filters as cascades of second-order sections.
//!
//! Sections are designed from the analog prototype poles with a prewarped
//! bilinear transform and run in Direct Form II Transposed. A bandpass is
//! the cascade of a lowpass at the upper corner and a highpass at the lower
//! corner.

use std::f64::consts::PI;

use num_complex::Complex;
use tracing::warn;

use crate::error::{Result, XcorrError};

pub const DEFAULT_CORNERS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BandKind {
    Bandpass { freqmin: f64, freqmax: f64 },
    Lowpass { freq: f64 },
    Highpass { freq: f64 },
}

/// Filter specification. Sections are designed per sampling rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandFilter {
    pub kind: BandKind,
    /// Order of each Butterworth prototype
    pub corners: usize,
    /// Run forward and backward for zero phase shift
    pub zerophase: bool,
}

impl BandFilter {
    pub fn bandpass(freqmin: f64, freqmax: f64) -> Self {
        Self::new(BandKind::Bandpass { freqmin, freqmax })
    }

    pub fn lowpass(freq: f64) -> Self {
        Self::new(BandKind::Lowpass { freq })
    }

    pub fn highpass(freq: f64) -> Self {
        Self::new(BandKind::Highpass { freq })
    }

    fn new(kind: BandKind) -> Self {
        Self {
            kind,
            corners: DEFAULT_CORNERS,
            zerophase: false,
        }
    }

    pub fn with_corners(mut self, corners: usize) -> Self {
        self.corners = corners;
        self
    }

    pub fn with_zerophase(mut self, zerophase: bool) -> Self {
        self.zerophase = zerophase;
        self
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            BandKind::Bandpass { .. } => "bandpass",
            BandKind::Lowpass { .. } => "lowpass",
            BandKind::Highpass { .. } => "highpass",
        }
    }

    /// Design the section cascade for `sampling_rate`.
    ///
    /// A bandpass whose upper corner reaches Nyquist degrades to a highpass.
    pub fn design(&self, sampling_rate: f64) -> Result<SosFilter> {
        let stage = self.name();
        if self.corners == 0 {
            return Err(XcorrError::stage_arg(stage, "corners must be at least 1"));
        }
        if !(sampling_rate > 0.0) {
            return Err(XcorrError::stage_arg(stage, "sampling rate must be positive"));
        }
        let nyquist = 0.5 * sampling_rate;
        let check = |f: f64| -> Result<()> {
            if f > 0.0 && f < nyquist {
                Ok(())
            } else {
                Err(XcorrError::stage_arg(
                    stage,
                    format!("corner {f} Hz must lie in (0, {nyquist}) Hz"),
                ))
            }
        };
        let sections = match self.kind {
            BandKind::Lowpass { freq } => {
                check(freq)?;
                butterworth_sections(self.corners, freq, sampling_rate, Response::Lowpass)
            }
            BandKind::Highpass { freq } => {
                check(freq)?;
                butterworth_sections(self.corners, freq, sampling_rate, Response::Highpass)
            }
            BandKind::Bandpass { freqmin, freqmax } => {
                check(freqmin)?;
                if freqmax <= freqmin {
                    return Err(XcorrError::stage_arg(stage, "freqmax must exceed freqmin"));
                }
                if freqmax >= nyquist {
                    warn!(freqmax, nyquist, "upper corner at or above Nyquist, applying highpass instead");
                    butterworth_sections(self.corners, freqmin, sampling_rate, Response::Highpass)
                } else {
                    let mut sections =
                        butterworth_sections(self.corners, freqmax, sampling_rate, Response::Lowpass);
                    sections.extend(butterworth_sections(
                        self.corners,
                        freqmin,
                        sampling_rate,
                        Response::Highpass,
                    ));
                    sections
                }
            }
        };
        Ok(SosFilter { sections })
    }

    /// Run a cascade from [`BandFilter::design`] over `data` in place,
    /// forward and backward when zero-phase.
    pub fn apply(&self, sos: &SosFilter, data: &mut [f64]) {
        if self.zerophase {
            sos.filtfilt(data);
        } else {
            sos.filter(data);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Response {
    Lowpass,
    Highpass,
}

/// Second-order section `(b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 2],
}

impl Biquad {
    /// Poles inside the unit circle.
    pub fn is_stable(&self) -> bool {
        self.a[1].abs() < 1.0 && self.a[0].abs() < 1.0 + self.a[1]
    }

    fn response(&self, z_inv: Complex<f64>) -> Complex<f64> {
        let z_inv2 = z_inv * z_inv;
        let num = self.b[0] + z_inv * self.b[1] + z_inv2 * self.b[2];
        let den = 1.0 + z_inv * self.a[0] + z_inv2 * self.a[1];
        num / den
    }

    fn run(&self, data: &mut [f64]) {
        let mut s0 = 0.0;
        let mut s1 = 0.0;
        for x in data.iter_mut() {
            let input = *x;
            let output = self.b[0] * input + s0;
            s0 = self.b[1] * input - self.a[0] * output + s1;
            s1 = self.b[2] * input - self.a[1] * output;
            *x = output;
        }
    }
}

/// Cascade of second-order sections.
#[derive(Clone, Debug, PartialEq)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    pub fn is_stable(&self) -> bool {
        self.sections.iter().all(Biquad::is_stable)
    }

    /// Causal filtering, zero initial state.
    pub fn filter(&self, data: &mut [f64]) {
        for section in &self.sections {
            section.run(data);
        }
    }

    /// Forward pass, then the same filter over the reversed output.
    pub fn filtfilt(&self, data: &mut [f64]) {
        self.filter(data);
        data.reverse();
        self.filter(data);
        data.reverse();
    }

    /// Magnitude of the frequency response at `freq_hz`.
    pub fn magnitude(&self, freq_hz: f64, sampling_rate: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / sampling_rate;
        let z_inv = Complex::from_polar(1.0, -omega);
        self.sections
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
            .norm()
    }
}

/// Prewarped analog corner (rad/s) for the bilinear transform.
fn prewarp(freq_hz: f64, sample_rate: f64) -> f64 {
    2.0 * sample_rate * (PI * freq_hz / sample_rate).tan()
}

/// Butterworth prototype poles in the upper half plane plus the real pole
/// of odd orders; conjugates are implied.
fn butterworth_poles(order: usize) -> Vec<Complex<f64>> {
    (0..order)
        .map(|k| {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            Complex::new(theta.cos(), theta.sin())
        })
        .filter(|p| p.im > -1e-12)
        .collect()
}

fn butterworth_sections(order: usize, cutoff_hz: f64, sample_rate: f64, response: Response) -> Vec<Biquad> {
    let wc = prewarp(cutoff_hz, sample_rate);
    let k = 2.0 * sample_rate;
    butterworth_poles(order)
        .into_iter()
        .map(|p| {
            if p.im.abs() < 1e-10 {
                bilinear_1pole(p.re * wc, k, response)
            } else {
                bilinear_2pole(p * wc, k, response)
            }
        })
        .collect()
}

fn bilinear_1pole(p: f64, k: f64, response: Response) -> Biquad {
    let alpha = k - p;
    let a1 = -(k + p) / alpha;
    let b = match response {
        Response::Lowpass => [-p / alpha, -p / alpha, 0.0],
        Response::Highpass => [k / alpha, -k / alpha, 0.0],
    };
    Biquad { b, a: [a1, 0.0] }
}

fn bilinear_2pole(p: Complex<f64>, k: f64, response: Response) -> Biquad {
    let mag_sq = p.norm_sqr();
    let k2 = k * k;
    let d = k2 - 2.0 * k * p.re + mag_sq;
    let a = [2.0 * (mag_sq - k2) / d, (k2 + 2.0 * k * p.re + mag_sq) / d];
    let b = match response {
        Response::Lowpass => [mag_sq / d, 2.0 * mag_sq / d, mag_sq / d],
        Response::Highpass => [k2 / d, -2.0 * k2 / d, k2 / d],
    };
    Biquad { b, a }
}
