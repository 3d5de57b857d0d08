//! # ns-viz
//!
//! Report artifacts for Geweke runs.
//!
//! This crate does not draw anything. It emits plot-friendly JSON structures
//! (bin edges, counts, KL curves) and a small text summary, laid out in one
//! directory per run.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Histogram artifacts and percentile clipping.
pub mod histogram;

/// Report assembly, summary KLs and report directories.
pub mod report;

/// Per-variable binning strategy and display labels.
pub mod strategy;

pub use histogram::{HistogramArtifact, clip_extremes, percentile, render_histogram};
pub use report::{
    DEFAULT_DIRECTORY_PREFIX, GewekeReport, VariablePanel, VariableReport, build_report,
    directory_name, final_kls, parameters_text, summary_kls, write_report,
};
pub use strategy::{NamePattern, RenderStrategy, StrategyTable, variable_label};
