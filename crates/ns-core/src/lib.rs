//! # ns-core
//!
//! Core types for the NextStat Geweke harness.
//!
//! This crate defines the error taxonomy, the data shapes exchanged with an
//! MCMC inference engine, and the `InferenceEngine` trait. The harness in
//! `ns-geweke` depends on this boundary, NOT on a concrete engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error types.
pub mod error;
/// Inference engine boundary traits.
pub mod traits;
/// Shared data types.
pub mod types;

pub use error::{Error, Result};
pub use traits::{EngineFactory, InferenceEngine};
pub use types::{
    Cell, ColumnMetadata, ColumnType, CrpPartition, DatasetMetadata, GRID_RESOLUTION, HyperGrids,
    InitMode, LatentState, PartitionState, RowMetadata, Table, ViewState, linspace, zero_table,
};

/// Crate version, stamped into emitted artifacts.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
