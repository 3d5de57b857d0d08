//! Chain driver: one posterior chain or one forward-sampling partition.
//!
//! Engine errors are not handled here; they propagate to the executor and
//! abort the whole partition.

use ns_core::{
    DatasetMetadata, HyperGrids, InferenceEngine, InitMode, LatentState, PartitionState, Result,
    RowMetadata, Table, zero_table,
};

use crate::collection::DiagnosticCollection;
use crate::extract::VariableSet;

/// Immutable inputs shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct SamplingContext {
    /// Column metadata of the synthetic dataset.
    pub metadata: DatasetMetadata,
    /// Initial dataset; also fixes the table shape.
    pub table: Table,
    /// Hyperparameter search grids.
    pub grids: HyperGrids,
    /// Columns whose hyperparameters are tracked.
    pub probe_columns: Vec<usize>,
}

impl SamplingContext {
    /// Number of rows of the dataset.
    pub fn n_rows(&self) -> usize {
        self.table.len()
    }

    /// Number of columns of the dataset.
    pub fn n_cols(&self) -> usize {
        self.metadata.n_columns()
    }
}

/// Regenerate a full table from the current state: one predictive sample per
/// row, querying every column of that row.
pub fn sample_table<E: InferenceEngine>(
    engine: &mut E,
    metadata: &DatasetMetadata,
    latent: &LatentState,
    partition: &PartitionState,
    n_rows: usize,
) -> Result<Table> {
    let mut table = Vec::with_capacity(n_rows);
    for row in 0..n_rows {
        let queries = metadata.query_cells(row);
        let sample = engine
            .simple_predictive_sample(metadata, latent, partition, &[], &queries, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ns_core::Error::Engine(format!("predictive sample for row {row} returned no draws"))
            })?;
        if sample.len() != queries.len() {
            return Err(ns_core::Error::Engine(format!(
                "predictive sample for row {row} has {} values, expected {}",
                sample.len(),
                queries.len()
            )));
        }
        table.push(sample);
    }
    Ok(table)
}

/// Run one posterior chain for `n_iters` iterations.
///
/// Each iteration: `analyze` on the current table, record diagnostics, then
/// replace the table with a predictive draw from the new state.
pub fn run_posterior_chain<E: InferenceEngine>(
    engine: &mut E,
    ctx: &SamplingContext,
    n_iters: usize,
) -> Result<DiagnosticCollection> {
    let mut table = ctx.table.clone();
    let row_metadata = RowMetadata::from_table(&table);
    let (mut latent, mut partition) =
        engine.initialize(&ctx.metadata, &row_metadata, &table, InitMode::FromThePrior)?;
    let variables = VariableSet::discover(&latent, &ctx.probe_columns)?;

    let mut collection = DiagnosticCollection::new();
    for _ in 0..n_iters {
        (latent, partition) = engine.analyze(&ctx.metadata, &table, latent, partition, &ctx.grids)?;
        collection.push(variables.extract(&latent)?)?;
        table = sample_table(engine, &ctx.metadata, &latent, &partition, ctx.n_rows())?;
    }
    Ok(collection)
}

/// Draw `n_samples` independent prior samples on a zero-filled table.
///
/// Every sample is a fresh `initialize`; there is no `analyze` step.
pub fn run_forward_samples<E: InferenceEngine>(
    engine: &mut E,
    ctx: &SamplingContext,
    n_samples: usize,
) -> Result<DiagnosticCollection> {
    let table = zero_table(ctx.n_rows(), ctx.n_cols());
    let row_metadata = RowMetadata::from_table(&table);

    let mut variables: Option<VariableSet> = None;
    let mut collection = DiagnosticCollection::new();
    for _ in 0..n_samples {
        let (latent, _partition) = engine.initialize(
            &ctx.metadata,
            &row_metadata,
            &table,
            InitMode::WithGrids(&ctx.grids),
        )?;
        let snapshot = match &variables {
            Some(v) => v.extract(&latent)?,
            None => {
                let v = VariableSet::discover(&latent, &ctx.probe_columns)?;
                let snapshot = v.extract(&latent)?;
                variables = Some(v);
                snapshot
            }
        };
        collection.push(snapshot)?;
    }
    Ok(collection)
}
