//! Barrier + sum-reduction of partial (zero-elsewhere) results.
//!
//! Every worker fills only the columns it owns and leaves the others at
//! exactly zero, so an elementwise sum reproduces the single-worker result.

use num_complex::Complex;
use tracing::debug;

use crate::error::{Result, XcorrError};
use crate::group::WorkerGroup;
use crate::matrix::{flatten_complex, unflatten_complex, Matrix};

pub fn all_reduce_matrix<G: WorkerGroup + ?Sized>(group: &G, matrix: &mut Matrix<f64>) -> Result<()> {
    group.barrier();
    group.all_reduce_sum(matrix.as_mut_slice())
}

/// Reduce a complex spectrum matrix as interleaved real/imaginary parts.
pub fn all_reduce_spectrum<G: WorkerGroup + ?Sized>(
    group: &G,
    spectrum: &mut Matrix<Complex<f64>>,
) -> Result<()> {
    if group.size() == 1 {
        group.barrier();
        return Ok(());
    }
    let mut flat = flatten_complex(spectrum.as_slice());
    group.barrier();
    group.all_reduce_sum(&mut flat)?;
    unflatten_complex(&flat, spectrum.as_mut_slice());
    debug!(rank = group.rank(), bins = spectrum.rows(), cols = spectrum.cols(), "spectrum reduced");
    Ok(())
}

/// Joint reduction of the correlation matrix and its start-time vector.
pub fn all_reduce_correlation<G: WorkerGroup + ?Sized>(
    group: &G,
    correlations: &mut Matrix<f64>,
    start_times: &mut [f64],
) -> Result<()> {
    group.barrier();
    group.all_reduce_sum(correlations.as_mut_slice())?;
    group.all_reduce_sum(start_times)?;
    debug!(rank = group.rank(), pairs = correlations.cols(), "correlations reduced");
    Ok(())
}

/// Agree on the outcome of a local stage before the next collective.
///
/// Every worker contributes a failure flag to a sum-reduction. If any worker
/// failed, all of them return an error: the failing ones their own, the
/// others [`XcorrError::PeerFailed`].
pub fn all_ok<G: WorkerGroup + ?Sized, T>(group: &G, local: Result<T>) -> Result<T> {
    let mut flag = [if local.is_err() { 1.0 } else { 0.0 }];
    group.all_reduce_sum(&mut flag)?;
    let failed = flag[0].round() as usize;
    match local {
        Err(err) => Err(err),
        Ok(_) if failed > 0 => Err(XcorrError::PeerFailed { failed }),
        Ok(value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{SoloGroup, ThreadGroup};
    use crate::partition::owned_range;

    #[test]
    fn partial_columns_reassemble() {
        let cols = 5;
        let results = ThreadGroup::run(3, |group| {
            let mut m = Matrix::<f64>::zeros(2, cols);
            for j in owned_range(cols, group.size(), group.rank()) {
                m.column_mut(j).copy_from_slice(&[j as f64, -(j as f64)]);
            }
            all_reduce_matrix(group, &mut m).unwrap();
            m
        });
        for m in results {
            for j in 0..cols {
                assert_eq!(m.column(j), &[j as f64, -(j as f64)]);
            }
        }
    }

    #[test]
    fn spectrum_reduction_keeps_phase() {
        let results = ThreadGroup::run(2, |group| {
            let mut m = Matrix::<Complex<f64>>::zeros(1, 2);
            m.column_mut(group.rank())[0] = Complex::new(1.0 + group.rank() as f64, -0.5);
            all_reduce_spectrum(group, &mut m).unwrap();
            m
        });
        for m in results {
            assert_eq!(m.column(0)[0], Complex::new(1.0, -0.5));
            assert_eq!(m.column(1)[0], Complex::new(2.0, -0.5));
        }
    }

    #[test]
    fn one_failure_aborts_all_workers() {
        let results = ThreadGroup::run(3, |group| {
            let local: Result<()> = if group.rank() == 1 {
                Err(XcorrError::InvalidConfig("boom".into()))
            } else {
                Ok(())
            };
            all_ok(group, local)
        });
        assert_eq!(results[1], Err(XcorrError::InvalidConfig("boom".into())));
        assert_eq!(results[0], Err(XcorrError::PeerFailed { failed: 1 }));
        assert_eq!(results[2], Err(XcorrError::PeerFailed { failed: 1 }));
    }

    #[test]
    fn solo_agreement_passes_value_through() {
        assert_eq!(all_ok(&SoloGroup, Ok(7)), Ok(7));
    }
}
