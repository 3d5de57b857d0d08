//! # ns-geweke
//!
//! Geweke joint-distribution test for MCMC inference engines.
//!
//! The test compares two empirical distributions of scalar diagnostics:
//! - forward samples, drawn straight from the engine's prior;
//! - posterior chains that alternate "fit latent state to data" with
//!   "regenerate data from latent state".
//!
//! A correct sampler makes the two agree at stationarity. Agreement is scored
//! per (chain, variable) with a growing-window KL divergence.
//!
//! ## Architecture
//!
//! This crate depends on the `InferenceEngine` trait from ns-core, NOT on a
//! concrete engine. Every worker builds its own engine from its own seed.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Merging per-worker collections.
pub mod aggregate;
/// Per-worker diagnostic time series.
pub mod collection;
/// Run configuration and plan resolution.
pub mod config;
/// Chain driver (posterior and forward modes).
pub mod driver;
/// Parallel fan-out over seeded partitions.
pub mod executor;
/// Diagnostic variable discovery and extraction.
pub mod extract;
/// Histogram grids, epsilon handling and densities.
pub mod histogram;
/// Growing-window KL divergence scoring.
pub mod kl;
/// End-to-end orchestration.
pub mod tester;

pub use aggregate::{AggregatedDataset, merge_forward};
pub use collection::DiagnosticCollection;
pub use config::{GewekeConfig, RunParameters, RunPlan, read_config};
pub use driver::{SamplingContext, run_forward_samples, run_posterior_chain, sample_table};
pub use executor::{Execution, SeedDomain, derive_seeds, fan_out, install, split_samples};
pub use extract::{COLUMN_CRP_ALPHA, DiagnosticVariable, VIEW_0_CRP_ALPHA, VariableSet};
pub use histogram::HistogramGrid;
pub use kl::{DivergenceSeries, MIN_WINDOW, kl_series, kl_series_with};
pub use tester::{GewekeResult, GewekeTester, VariableOutcome, score_all, score_variable};
