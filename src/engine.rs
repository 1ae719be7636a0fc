//! SPMD correlation call: preprocessing, spectra, reduction, correlation.
//!
//! Every worker of the group runs the same call with the same inputs. Work
//! is split by [`owned_range`]; partial matrices are completed with a
//! sum-reduction after the spectral stage and after correlation.

use std::ops::Range;
use std::time::Instant;

use num_complex::Complex;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::combine::{enumerate_combinations, with_self_pairs, Combination, PairingPolicy};
use crate::config::CorrelationConfig;
use crate::error::{Result, XcorrError};
use crate::geo::DEFAULT_REFERENCE_EPOCH;
use crate::group::WorkerGroup;
use crate::matrix::Matrix;
use crate::partition::owned_range;
use crate::preprocess::{apply_fd_stages, apply_td_stages, FdStage, StageContext, TdStage, ZeroPadding};
use crate::reduce::{all_ok, all_reduce_correlation, all_reduce_spectrum};
use crate::rotate::rotate_correlations;
use crate::trace::{combine_stats, ChannelInfo, CorrelationSet, CorrelationTrace, Subdivision, Trace};
use crate::utils::{rfft_freqs, FftCache, FftHelper};
use crate::xcf::{check_lag_window, correlate_owned};

/// Output of [`Engine::correlate`].
#[derive(Clone, Debug, PartialEq)]
pub struct Correlation {
    /// `2*S+1` lags by one column per combination
    pub matrix: Matrix<f64>,
    /// Start time of each column (Unix seconds)
    pub start_times: Vec<f64>,
}

/// Options of the trace-level wrapper; sampling rate, start times and the
/// combination list come from the traces themselves.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceOptions {
    pub length_to_save: f64,
    pub pairing: PairingPolicy,
    /// Also correlate every channel with itself
    pub self_pairs: bool,
    pub td_stages: Vec<TdStage>,
    pub fd_stages: Vec<FdStage>,
    pub zero_padding: ZeroPadding,
    pub normalize_correlation: bool,
    pub center_correlation: bool,
    pub reference_epoch: f64,
    /// Rotate complete ENZ tensors into RTZ
    pub rotate: bool,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            length_to_save: 10.0,
            pairing: PairingPolicy::default(),
            self_pairs: false,
            td_stages: Vec::new(),
            fd_stages: Vec::new(),
            zero_padding: ZeroPadding::default(),
            normalize_correlation: true,
            center_correlation: false,
            reference_epoch: DEFAULT_REFERENCE_EPOCH,
            rotate: false,
        }
    }
}

impl TraceOptions {
    fn config(&self, sampling_rate: f64, start_times: Vec<f64>, combinations: Vec<Combination>) -> CorrelationConfig {
        CorrelationConfig {
            sampling_rate,
            length_to_save: self.length_to_save,
            combinations,
            start_times,
            td_stages: self.td_stages.clone(),
            fd_stages: self.fd_stages.clone(),
            zero_padding: self.zero_padding,
            normalize_correlation: self.normalize_correlation,
            center_correlation: self.center_correlation,
            reference_epoch: self.reference_epoch,
        }
    }
}

/// Correlation engine. Holds the FFT plan cache shared by all calls and by
/// all workers of an in-process group.
#[derive(Default)]
pub struct Engine {
    cache: FftCache,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(cache: FftCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &FftCache {
        &self.cache
    }

    /// Correlate the columns of `channels` (samples by channels) for every
    /// combination in `config`.
    ///
    /// Collective: every worker of `group` must call this with identical
    /// arguments.
    pub fn correlate<G: WorkerGroup + ?Sized>(
        &self,
        group: &G,
        channels: Matrix<f64>,
        config: &CorrelationConfig,
    ) -> Result<Correlation> {
        let started = Instant::now();
        let (size, rank) = (group.size(), group.rank());
        let sample_to_save = config.sample_to_save();
        all_ok(group, config.validate(channels.cols()))?;

        if config.combinations.is_empty() {
            warn!(rank, "no combinations to correlate");
            return Ok(Correlation {
                matrix: Matrix::zeros(2 * sample_to_save + 1, 0),
                start_times: Vec::new(),
            });
        }

        let fft_len = config
            .zero_padding
            .padded_len(channels.rows(), config.sampling_rate, config.length_to_save);
        check_lag_window(sample_to_save, fft_len)?;
        let fft = self.cache.helper(fft_len);

        let channel_owned = owned_range(channels.cols(), size, rank);
        debug!(rank, size, channels = ?channel_owned, fft_len, "preprocessing owned channels");
        let local = spectra_of_owned(channels, config, &fft, channel_owned);
        let mut spectra = all_ok(group, local)?;
        all_reduce_spectrum(group, &mut spectra)?;

        let pair_owned = owned_range(config.combinations.len(), size, rank);
        debug!(rank, pairs = ?pair_owned, "correlating owned pairs");
        let local = correlate_owned(&spectra, &fft, config, pair_owned);
        let (mut matrix, mut start_times) = all_ok(group, local)?;
        all_reduce_correlation(group, &mut matrix, &mut start_times)?;

        info!(
            rank,
            size,
            channels = spectra.cols(),
            pairs = matrix.cols(),
            fft_len,
            lags = matrix.rows(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "correlation finished"
        );
        Ok(Correlation { matrix, start_times })
    }

    /// Correlate a set of traces.
    ///
    /// Rank 0's traces are broadcast first, so all workers compute on
    /// identical inputs. Shorter traces are zero-filled to the longest one.
    pub fn correlate_traces<G: WorkerGroup + ?Sized>(
        &self,
        group: &G,
        traces: &[Trace],
        options: &TraceOptions,
    ) -> Result<CorrelationSet> {
        let traces = share_traces(group, traces)?;
        self.correlate_shared(group, &traces, options)
    }

    /// Correlate overlapping sub-windows of the traces, one set per window.
    ///
    /// Windows start at the earliest trace start and advance by
    /// `corr_inc` until the longest trace is covered. Windows without any
    /// pair to correlate yield an empty set.
    pub fn correlate_subdivided<G: WorkerGroup + ?Sized>(
        &self,
        group: &G,
        traces: &[Trace],
        options: &TraceOptions,
        subdivision: &Subdivision,
    ) -> Result<Vec<CorrelationSet>> {
        let traces = share_traces(group, traces)?;
        let Some(origin) = traces.iter().map(|t| t.start_time).reduce(f64::min) else {
            return Ok(Vec::new());
        };
        let read_len = traces
            .iter()
            .map(|t| t.start_time + t.data.len() as f64 / t.sampling_rate - origin)
            .fold(0.0, f64::max);
        let count = subdivision.count(read_len);
        debug!(rank = group.rank(), read_len, windows = count, "subdividing traces");

        (0..count)
            .map(|k| {
                let window = subdivision.split(&traces, origin, k);
                self.correlate_shared(group, &window, options)
            })
            .collect()
    }

    /// Correlation of traces that are already identical on every worker.
    fn correlate_shared<G: WorkerGroup + ?Sized>(
        &self,
        group: &G,
        traces: &[Trace],
        options: &TraceOptions,
    ) -> Result<CorrelationSet> {
        let infos: Vec<ChannelInfo> = traces.iter().map(|t| t.info.clone()).collect();
        let mut combinations = enumerate_combinations(&infos, options.pairing);
        if options.self_pairs {
            combinations = with_self_pairs(&combinations, infos.len());
        }
        if combinations.is_empty() {
            warn!(rank = group.rank(), traces = traces.len(), "no combinations to correlate");
            return Ok(CorrelationSet::default());
        }

        let sampling_rate = traces.first().map_or(0.0, |t| t.sampling_rate);
        let npts = traces.iter().map(|t| t.data.len()).max().unwrap_or(0);
        let mut channels = Matrix::zeros(npts, traces.len());
        for (k, trace) in traces.iter().enumerate() {
            channels.column_mut(k)[..trace.data.len()].copy_from_slice(&trace.data);
        }
        let start_times = traces.iter().map(|t| t.start_time).collect();

        let config = options.config(sampling_rate, start_times, combinations);
        let correlation = self.correlate(group, channels, &config)?;
        let npts_out = correlation.matrix.rows();
        let traces: Vec<CorrelationTrace> = config
            .combinations
            .iter()
            .enumerate()
            .map(|(k, &(i, j))| {
                let mut stats = combine_stats(&infos[i], &infos[j]);
                stats.start_time = correlation.start_times[k];
                stats.sampling_rate = sampling_rate;
                stats.npts = npts_out;
                CorrelationTrace {
                    stats,
                    data: correlation.matrix.column(k).to_vec(),
                }
            })
            .collect();
        let set = CorrelationSet::new(traces);
        if options.rotate {
            let rotated = rotate_correlations(&set);
            debug!(rank = group.rank(), before = set.len(), after = rotated.len(), "rotated to RTZ");
            return Ok(rotated);
        }
        Ok(set)
    }
}

/// Replace every worker's traces by rank 0's: sampling rate, lengths, start
/// times and samples are broadcast, metadata stays local.
pub fn share_traces<G: WorkerGroup + ?Sized>(group: &G, traces: &[Trace]) -> Result<Vec<Trace>> {
    all_ok(group, check_sampling_rates(traces))?;

    let mut header = [0.0; 2];
    if group.rank() == 0 {
        header = [traces.len() as f64, traces.first().map_or(0.0, |t| t.sampling_rate)];
    }
    group.broadcast(&mut header, 0)?;
    let (n_traces, sampling_rate) = (header[0] as usize, header[1]);
    let local = if n_traces == traces.len() {
        Ok(())
    } else {
        Err(XcorrError::ShapeMismatch {
            expected: format!("{n_traces} traces as on rank 0"),
            actual: format!("{} traces on rank {}", traces.len(), group.rank()),
        })
    };
    all_ok(group, local)?;

    let mut lengths: Vec<f64> = traces.iter().map(|t| t.data.len() as f64).collect();
    group.broadcast(&mut lengths, 0)?;
    let mut start_times: Vec<f64> = traces.iter().map(|t| t.start_time).collect();
    group.broadcast(&mut start_times, 0)?;

    let npts = lengths.iter().fold(0.0, |a: f64, &b| a.max(b)) as usize;
    let mut samples = Matrix::zeros(npts, n_traces);
    if group.rank() == 0 {
        for (k, trace) in traces.iter().enumerate() {
            samples.column_mut(k)[..trace.data.len()].copy_from_slice(&trace.data);
        }
    }
    group.broadcast(samples.as_mut_slice(), 0)?;
    debug!(rank = group.rank(), traces = n_traces, npts, "traces shared");

    Ok(traces
        .iter()
        .enumerate()
        .map(|(k, trace)| {
            let len = lengths[k] as usize;
            Trace::new(
                trace.info.clone(),
                samples.column(k)[..len].to_vec(),
                start_times[k],
                sampling_rate,
            )
        })
        .collect())
}

fn check_sampling_rates(traces: &[Trace]) -> Result<()> {
    let Some(first) = traces.first() else {
        return Ok(());
    };
    for (index, trace) in traces.iter().enumerate().skip(1) {
        if trace.sampling_rate != first.sampling_rate {
            return Err(XcorrError::SamplingRateMismatch {
                index,
                expected: first.sampling_rate,
                found: trace.sampling_rate,
            });
        }
    }
    Ok(())
}

/// Time-domain stages, zero padding, forward FFT and frequency-domain
/// stages for the owned channels. Other columns of the result are zero.
fn spectra_of_owned(
    mut channels: Matrix<f64>,
    config: &CorrelationConfig,
    fft: &FftHelper,
    owned: Range<usize>,
) -> Result<Matrix<Complex<f64>>> {
    let td_ctx = StageContext::time_domain(config.sampling_rate, config.length_to_save);
    apply_td_stages(&config.td_stages, &mut channels, owned.clone(), &td_ctx)?;

    let padded = channels.resized_rows(fft.len());
    let mut spectra = Matrix::<Complex<f64>>::zeros(fft.half_len(), padded.cols());
    spectra
        .columns_mut(owned.clone())
        .into_par_iter()
        .zip(owned.clone().into_par_iter())
        .try_for_each(|(out, k)| {
            let mut scratch = padded.column(k).to_vec();
            fft.forward_r2c_process(&mut scratch, out)
        })?;

    let freqs = rfft_freqs(fft.len(), config.sampling_rate);
    let fd_ctx = StageContext {
        sampling_rate: config.sampling_rate,
        length_to_save: config.length_to_save,
        freqs: &freqs,
        fft: Some(fft),
    };
    apply_fd_stages(&config.fd_stages, &mut spectra, owned, &fd_ctx)?;
    Ok(spectra)
}
