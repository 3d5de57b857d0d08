//! Growing-window KL divergence between forward and posterior samples.
//!
//! For a (chain, variable) pair the forward series is the reference: the
//! divergence is always `KL(forward || posterior)`, never the reverse.
//!
//! Entry `i` of a [`DivergenceSeries`] scores the first `i + 1` samples of
//! both series on a grid built once from the full forward series. Entries
//! below [`MIN_WINDOW`] are undefined, and so is any window where either
//! histogram has an empty bin (the log-ratio has no support there).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::executor::Execution;
use crate::histogram::{HistogramGrid, zero_eps};

/// Smallest number of samples a divergence estimate is attempted on.
pub const MIN_WINDOW: usize = 10;

/// Divergence estimates indexed by iteration; `None` marks undefined entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DivergenceSeries {
    values: Vec<Option<f64>>,
}

impl DivergenceSeries {
    /// Wrap raw entries.
    pub fn new(values: Vec<Option<f64>>) -> Self {
        Self { values }
    }

    /// A series of `len` undefined entries.
    pub fn undefined(len: usize) -> Self {
        Self { values: vec![None; len] }
    }

    /// Entries, in iteration order.
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the series has no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entry `i`, `None` when undefined or out of range.
    pub fn get(&self, i: usize) -> Option<f64> {
        self.values.get(i).copied().flatten()
    }

    /// Last entry (the divergence over all samples).
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }

    /// Number of defined entries.
    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Entries with NaN for undefined ones (plot-friendly).
    pub fn to_nan_vec(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }
}

/// `sum_i w_i * p_i * ln(p_i / q_i)` over the grid's bins.
///
/// Undefined if the densities don't match the grid or if either density has an
/// empty bin. Rounding can leave a result a hair below zero; it is clamped.
pub fn kl_divergence(grid: &HistogramGrid, p: &[f64], q: &[f64]) -> Option<f64> {
    if p.len() != grid.n_bins() || q.len() != grid.n_bins() {
        return None;
    }
    if p.iter().chain(q).any(|&d| !(d > 0.0) || !d.is_finite()) {
        return None;
    }
    let kl: f64 = p
        .iter()
        .zip(q)
        .zip(grid.widths())
        .map(|((&pi, &qi), w)| w * pi * (pi / qi).ln())
        .sum();
    if kl.is_finite() { Some(kl.max(0.0)) } else { None }
}

/// Divergence over the first `n` samples of both series.
pub fn windowed_kl(grid: &HistogramGrid, forward: &[f64], posterior: &[f64], n: usize) -> Option<f64> {
    let n = n.min(forward.len()).min(posterior.len());
    let p = grid.density(&forward[..n])?;
    let q = grid.density(&posterior[..n])?;
    kl_divergence(grid, &p, &q)
}

/// Both series truncated to the shorter length.
pub fn make_same_length<'a>(a: &'a [f64], b: &'a [f64]) -> (&'a [f64], &'a [f64]) {
    let n = a.len().min(b.len());
    (&a[..n], &b[..n])
}

/// Score one posterior chain's series for one variable against the forward
/// reference.
///
/// The result has one entry per sample of the truncated common length.
/// Windows are scored on the current rayon pool.
pub fn kl_series(forward: &[f64], posterior: &[f64]) -> DivergenceSeries {
    kl_series_with(forward, posterior, Execution::Parallel { threads: 0 })
}

/// [`kl_series`] with windows scored according to `execution`.
///
/// `Sequential` stays on the calling thread. `Parallel` uses whichever rayon
/// pool is current, so callers bound it with [`crate::executor::install`].
pub fn kl_series_with(forward: &[f64], posterior: &[f64], execution: Execution) -> DivergenceSeries {
    let (forward, posterior) = make_same_length(forward, posterior);
    let n = forward.len();

    let mut forward = forward.to_vec();
    let mut posterior = posterior.to_vec();
    zero_eps(&mut forward);
    zero_eps(&mut posterior);

    let Some(grid) = HistogramGrid::unique_bins(&forward) else {
        return DivergenceSeries::undefined(n);
    };

    let mut values = vec![None; n.min(MIN_WINDOW)];
    let window = |i: usize| windowed_kl(&grid, &forward, &posterior, i + 1);
    let scored: Vec<Option<f64>> = match execution {
        Execution::Sequential => (MIN_WINDOW..n).map(window).collect(),
        Execution::Parallel { .. } => (MIN_WINDOW..n).into_par_iter().map(window).collect(),
    };
    values.extend(scored);
    DivergenceSeries::new(values)
}
