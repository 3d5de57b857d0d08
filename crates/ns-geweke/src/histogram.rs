//! Histogram grids and density estimates over diagnostic series.
//!
//! Values in `(0, 1e-100)` come from sampler underflow. They are collapsed to
//! exactly zero before any grid is built so they cannot stretch a log-scale
//! axis over hundreds of decades.

use serde::{Deserialize, Serialize};

/// Upper bound (exclusive) of the epsilon band.
pub const EPSILON_THRESHOLD: f64 = 1e-100;

/// True if `v` lies strictly inside `(0, 1e-100)`.
#[inline]
pub fn is_eps(v: f64) -> bool {
    v > 0.0 && v < EPSILON_THRESHOLD
}

/// Set every epsilon value of `data` to exactly zero.
pub fn zero_eps(data: &mut [f64]) {
    for v in data.iter_mut() {
        if is_eps(*v) {
            *v = 0.0;
        }
    }
}

/// Copy of `data` without its epsilon values.
pub fn filter_eps(data: &[f64]) -> Vec<f64> {
    data.iter().copied().filter(|v| !is_eps(*v)).collect()
}

/// Bin edges shared by the forward and posterior density estimates.
///
/// Bins are half-open `[e_i, e_{i+1})` except the last, which is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramGrid {
    edges: Vec<f64>,
}

impl HistogramGrid {
    /// Edges from explicit values; needs at least two strictly increasing edges.
    pub fn from_edges(edges: Vec<f64>) -> Option<Self> {
        if edges.len() < 2 || edges.windows(2).any(|w| !(w[0] < w[1])) {
            return None;
        }
        Some(Self { edges })
    }

    /// One edge per distinct non-epsilon finite value of `data`, plus a
    /// trailing edge at `last + (last - second_to_last)`.
    ///
    /// Returns `None` when `data` has fewer than two distinct values.
    pub fn unique_bins(data: &[f64]) -> Option<Self> {
        let mut edges: Vec<f64> = filter_eps(data).into_iter().filter(|v| v.is_finite()).collect();
        edges.sort_by(f64::total_cmp);
        edges.dedup();
        let n = edges.len();
        if n < 2 {
            return None;
        }
        let delta = edges[n - 1] - edges[n - 2];
        edges.push(edges[n - 1] + delta);
        Self::from_edges(edges)
    }

    /// `n_bins` equal-width bins spanning `[lo, hi]`.
    pub fn uniform(lo: f64, hi: f64, n_bins: usize) -> Option<Self> {
        if n_bins == 0 || !(lo.is_finite() && hi.is_finite()) {
            return None;
        }
        let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
        Self::from_edges(ns_core::linspace(lo, hi, n_bins + 1))
    }

    /// Bin edges.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of bins (`edges - 1`).
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Width of each bin.
    pub fn widths(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Bin index of `v`, or `None` if it falls outside the grid.
    pub fn bin_of(&self, v: f64) -> Option<usize> {
        let first = self.edges[0];
        let last = self.edges[self.edges.len() - 1];
        if !(v >= first && v <= last) {
            return None;
        }
        if v == last {
            return Some(self.n_bins() - 1);
        }
        // Number of edges <= v, minus one.
        Some(self.edges.partition_point(|e| *e <= v) - 1)
    }

    /// Count of `data` values per bin; out-of-range values are dropped.
    pub fn counts(&self, data: &[f64]) -> Vec<u64> {
        let mut counts = vec![0u64; self.n_bins()];
        for &v in data {
            if let Some(b) = self.bin_of(v) {
                counts[b] += 1;
            }
        }
        counts
    }

    /// Normalised density (`count / (n_in_range * width)`), integrating to one
    /// over the grid. `None` if no value of `data` falls inside the grid.
    pub fn density(&self, data: &[f64]) -> Option<Vec<f64>> {
        let counts = self.counts(data);
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return None;
        }
        let total = total as f64;
        Some(counts.iter().zip(self.widths()).map(|(&c, w)| c as f64 / (total * w)).collect())
    }
}
