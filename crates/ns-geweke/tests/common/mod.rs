//! Seeded stub inference engine shared by the integration tests.
//!
//! Every hyperparameter is drawn from a small discrete prior, and `analyze`
//! redraws them from that same prior, so forward and posterior distributions
//! agree exactly. Knobs let tests inject values, failures and key changes.

#![allow(dead_code)]

use std::collections::BTreeMap;

use ns_core::{
    Cell, ColumnType, CrpPartition, DatasetMetadata, Error, HyperGrids, InferenceEngine, InitMode,
    LatentState, PartitionState, Result, RowMetadata, Table, ViewState,
};
use ns_geweke::SamplingContext;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

pub const ALPHA_CHOICES: [f64; 3] = [0.5, 1.0, 2.0];

#[derive(Debug, Clone, Default)]
pub struct StubKnobs {
    /// Overwrite `column_crp_alpha` with `value` after analyze call `iter`.
    pub inject: Option<(usize, f64)>,
    /// Fail analyze call `iter`.
    pub fail_at: Option<usize>,
    /// From analyze call `iter` on, add an extra hyperparameter to column 0.
    pub extra_key_from: Option<usize>,
    /// Posterior always reports this alpha (a broken sampler).
    pub biased_alpha: Option<f64>,
}

pub struct StubEngine {
    rng: StdRng,
    knobs: StubKnobs,
    pub analyze_calls: usize,
    pub initialize_calls: usize,
    pub seen_tables: Vec<Table>,
}

impl StubEngine {
    pub fn new(seed: u64, knobs: StubKnobs) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            knobs,
            analyze_calls: 0,
            initialize_calls: 0,
            seen_tables: Vec::new(),
        }
    }

    fn pick(&mut self, choices: &[f64]) -> f64 {
        choices[self.rng.random_range(0..choices.len())]
    }

    fn draw_hypers(&mut self, metadata: &DatasetMetadata, grids: &HyperGrids) -> Vec<BTreeMap<String, f64>> {
        let mut out = Vec::with_capacity(metadata.n_columns());
        for col in 0..metadata.n_columns() {
            let mut h = BTreeMap::new();
            h.insert("fixed".to_string(), 0.0);
            match metadata.column_type(col) {
                Some(ColumnType::Continuous) => {
                    h.insert("mu".to_string(), self.pick(&grids.mu_grid[14..17]));
                    h.insert("s".to_string(), self.pick(&grids.s_grid[1..4]));
                    h.insert("r".to_string(), self.pick(&ALPHA_CHOICES));
                    h.insert("nu".to_string(), self.pick(&ALPHA_CHOICES));
                }
                Some(ColumnType::Multinomial { cardinality }) => {
                    h.insert("K".to_string(), cardinality as f64);
                    h.insert("dirichlet_alpha".to_string(), self.pick(&ALPHA_CHOICES));
                }
                None => {}
            }
            out.push(h);
        }
        out
    }

    fn draw_state(
        &mut self,
        metadata: &DatasetMetadata,
        n_rows: usize,
        grids: &HyperGrids,
    ) -> (LatentState, PartitionState) {
        let latent = LatentState {
            column_partition: CrpPartition {
                alpha: self.pick(&ALPHA_CHOICES),
                assignments: vec![0; metadata.n_columns()],
            },
            column_hypers: self.draw_hypers(metadata, grids),
            view_states: vec![ViewState {
                row_partition: CrpPartition {
                    alpha: self.pick(&ALPHA_CHOICES),
                    assignments: vec![0; n_rows],
                },
            }],
        };
        let partition = PartitionState { row_assignments: vec![vec![0; n_rows]] };
        (latent, partition)
    }
}

impl InferenceEngine for StubEngine {
    fn initialize(
        &mut self,
        metadata: &DatasetMetadata,
        row_metadata: &RowMetadata,
        _data: &Table,
        mode: InitMode<'_>,
    ) -> Result<(LatentState, PartitionState)> {
        self.initialize_calls += 1;
        let default_grids;
        let grids = match mode {
            InitMode::WithGrids(g) => g,
            InitMode::FromThePrior => {
                default_grids = HyperGrids::new(100.0, 1000.0)?;
                &default_grids
            }
        };
        Ok(self.draw_state(metadata, row_metadata.n_rows(), grids))
    }

    fn analyze(
        &mut self,
        metadata: &DatasetMetadata,
        data: &Table,
        _latent: LatentState,
        partition: PartitionState,
        grids: &HyperGrids,
    ) -> Result<(LatentState, PartitionState)> {
        let iter = self.analyze_calls;
        self.analyze_calls += 1;
        self.seen_tables.push(data.clone());

        if self.knobs.fail_at == Some(iter) {
            return Err(Error::Engine(format!("analyze failed at iteration {iter}")));
        }

        let (mut latent, _) = self.draw_state(metadata, partition.n_rows(), grids);
        if let Some(alpha) = self.knobs.biased_alpha {
            latent.column_partition.alpha = alpha;
        }
        match self.knobs.inject {
            Some((at, value)) if at == iter => latent.column_partition.alpha = value,
            _ => {}
        }
        if self.knobs.extra_key_from.is_some_and(|from| iter >= from) {
            latent.column_hypers[0].insert("extra".to_string(), 1.0);
        }
        Ok((latent, partition))
    }

    fn simple_predictive_sample(
        &mut self,
        metadata: &DatasetMetadata,
        latent: &LatentState,
        _partition: &PartitionState,
        _constraints: &[(Cell, f64)],
        queries: &[Cell],
        n: usize,
    ) -> Result<Vec<Vec<f64>>> {
        let mut samples = Vec::with_capacity(n);
        for _ in 0..n {
            let mut row = Vec::with_capacity(queries.len());
            for q in queries {
                let v = match metadata.column_type(q.col) {
                    Some(ColumnType::Continuous) => {
                        let mu = latent.column_hypers[q.col].get("mu").copied().unwrap_or(0.0);
                        Normal::new(mu, 1.0)
                            .map_err(|e| Error::Engine(e.to_string()))?
                            .sample(&mut self.rng)
                    }
                    Some(ColumnType::Multinomial { cardinality }) => {
                        self.rng.random_range(0..cardinality) as f64
                    }
                    None => return Err(Error::Engine(format!("no column {}", q.col))),
                };
                row.push(v);
            }
            samples.push(row);
        }
        Ok(samples)
    }
}

/// Context with column 0 continuous and the rest binary multinomial.
pub fn context(n_rows: usize, n_cols: usize, probe_columns: Vec<usize>) -> SamplingContext {
    let types: Vec<ColumnType> = (0..n_cols)
        .map(|i| {
            if i == 0 { ColumnType::Continuous } else { ColumnType::Multinomial { cardinality: 2 } }
        })
        .collect();
    SamplingContext {
        metadata: DatasetMetadata::from_column_types(&types).unwrap(),
        table: ns_core::zero_table(n_rows, n_cols),
        grids: HyperGrids::new(100.0, 1000.0).unwrap(),
        probe_columns,
    }
}
