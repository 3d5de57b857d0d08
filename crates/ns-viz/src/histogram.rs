//! Histogram artifacts (numbers-first, arrays instead of nested objects).

use ns_core::{Error, Result};
use ns_geweke::HistogramGrid;
use serde::{Deserialize, Serialize};

use crate::strategy::RenderStrategy;

/// Lower / upper percentiles kept by [`clip_extremes`].
pub const CLIP_PERCENTILES: (f64, f64) = (0.5, 99.5);

/// Binned samples of one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramArtifact {
    /// Strategy that produced the bins.
    pub strategy: RenderStrategy,
    /// Draw the x-axis on a log scale.
    pub log_x: bool,
    /// `n_bins + 1` increasing edges.
    pub bin_edges: Vec<f64>,
    /// Samples per bin.
    pub counts: Vec<u64>,
    /// Samples the histogram was built from (including any outside the edges).
    pub n_samples: usize,
}

/// `p`-th percentile (0..=100) of `data` with linear interpolation between
/// order statistics. `None` for empty input.
pub fn percentile(data: &[f64], p: f64) -> Option<f64> {
    if data.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let h = (sorted.len() - 1) as f64 * p / 100.0;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Clamp `data` into its [`CLIP_PERCENTILES`] range.
pub fn clip_extremes(data: &[f64]) -> Vec<f64> {
    let (Some(lower), Some(upper)) =
        (percentile(data, CLIP_PERCENTILES.0), percentile(data, CLIP_PERCENTILES.1))
    else {
        return Vec::new();
    };
    data.iter().map(|v| v.clamp(lower, upper)).collect()
}

/// Bin `data` with `strategy`.
pub fn render_histogram(data: &[f64], strategy: RenderStrategy) -> Result<HistogramArtifact> {
    let (grid, binned, log_x) = match strategy {
        RenderStrategy::LogUniqueBins => {
            let grid = HistogramGrid::unique_bins(data).ok_or_else(|| {
                Error::Computation("unique bins need at least two distinct values".to_string())
            })?;
            (grid, data.to_vec(), true)
        }
        RenderStrategy::ClippedLinear { n_bins } => {
            let finite: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
            let clipped = clip_extremes(&finite);
            let lo = clipped.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = clipped.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let grid = HistogramGrid::uniform(lo, hi, n_bins).ok_or_else(|| {
                Error::Computation(format!("cannot build {n_bins} linear bins from {} samples", data.len()))
            })?;
            (grid, clipped, false)
        }
    };
    Ok(HistogramArtifact {
        strategy,
        log_x,
        counts: grid.counts(&binned),
        bin_edges: grid.edges().to_vec(),
        n_samples: data.len(),
    })
}
