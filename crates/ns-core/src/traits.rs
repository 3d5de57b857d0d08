//! Inference engine boundary.
//!
//! The Geweke harness drives an MCMC engine it knows only through these
//! traits: the engine's sampling algorithm and model stay on the other side.

use crate::Result;
use crate::types::{
    Cell, DatasetMetadata, HyperGrids, InitMode, LatentState, PartitionState, RowMetadata, Table,
};

/// MCMC inference engine consumed by the harness.
///
/// An engine owns its random stream; one instance is created per worker
/// from that worker's seed and is never shared between workers.
pub trait InferenceEngine {
    /// Draw a fresh latent/partition state for `data`.
    fn initialize(
        &mut self,
        metadata: &DatasetMetadata,
        row_metadata: &RowMetadata,
        data: &Table,
        mode: InitMode<'_>,
    ) -> Result<(LatentState, PartitionState)>;

    /// Advance the chain by one sweep conditioned on `data`.
    fn analyze(
        &mut self,
        metadata: &DatasetMetadata,
        data: &Table,
        latent: LatentState,
        partition: PartitionState,
        grids: &HyperGrids,
    ) -> Result<(LatentState, PartitionState)>;

    /// Draw `n` posterior-predictive samples of `queries`, conditioned on `constraints`.
    ///
    /// Each returned sample holds one value per query cell, in query order.
    fn simple_predictive_sample(
        &mut self,
        metadata: &DatasetMetadata,
        latent: &LatentState,
        partition: &PartitionState,
        constraints: &[(Cell, f64)],
        queries: &[Cell],
        n: usize,
    ) -> Result<Vec<Vec<f64>>>;
}

/// Builds one independently seeded engine per worker.
pub trait EngineFactory: Sync {
    /// Engine type produced by this factory.
    type Engine: InferenceEngine;

    /// Create an engine whose random stream is seeded with `seed`.
    fn create(&self, seed: u64) -> Result<Self::Engine>;
}

impl<F, E> EngineFactory for F
where
    F: Fn(u64) -> E + Sync,
    E: InferenceEngine,
{
    type Engine = E;

    fn create(&self, seed: u64) -> Result<E> {
        Ok(self(seed))
    }
}
