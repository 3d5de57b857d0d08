//! Run configuration (JSON or YAML) and its resolution into a run plan.

use std::path::Path;

use ns_core::{ColumnType, DatasetMetadata, Error, HyperGrids, Result, zero_table};
use serde::{Deserialize, Serialize};

use crate::driver::SamplingContext;
use crate::executor::{Execution, SeedDomain, available_workers, derive_seeds};

/// User-facing Geweke run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GewekeConfig {
    /// Rows of the synthetic dataset.
    #[serde(default = "default_num_rows")]
    pub num_rows: usize,
    /// Columns of the synthetic dataset (column 0 continuous, others multinomial).
    #[serde(default = "default_num_cols")]
    pub num_cols: usize,
    /// Base seed for posterior chains.
    #[serde(default)]
    pub inf_seed: u64,
    /// Base seed for forward sampling.
    #[serde(default)]
    pub gen_seed: u64,
    /// Number of posterior chains (`None` = available parallelism).
    #[serde(default)]
    pub num_chains: Option<usize>,
    /// Iteration budget. With more than one chain this is split across chains.
    #[serde(default = "default_num_iters")]
    pub num_iters: usize,
    /// Half-width of the `mu` grid.
    #[serde(default = "default_max_mu_grid")]
    pub max_mu_grid: f64,
    /// Upper end of the `s` grid (`None` = `max_mu_grid^2 / 3 * num_rows`).
    #[serde(default = "default_max_s_grid")]
    pub max_s_grid: Option<f64>,
    /// Columns whose hyperparameters are tracked.
    #[serde(default = "default_probe_columns")]
    pub probe_columns: Vec<usize>,
    /// Cardinality of every multinomial column.
    #[serde(default = "default_num_values")]
    pub num_values: usize,
    /// Forward-sampling workers (`None` = available parallelism).
    #[serde(default)]
    pub forward_workers: Option<usize>,
    /// Threads (0 = auto). Use 1 for the sequential path.
    #[serde(default)]
    pub threads: usize,
}

fn default_num_rows() -> usize {
    40
}

fn default_num_cols() -> usize {
    4
}

fn default_num_iters() -> usize {
    10_000
}

fn default_max_mu_grid() -> f64 {
    100.0
}

fn default_max_s_grid() -> Option<f64> {
    Some(1000.0)
}

fn default_probe_columns() -> Vec<usize> {
    vec![0, 1]
}

fn default_num_values() -> usize {
    2
}

impl Default for GewekeConfig {
    fn default() -> Self {
        Self {
            num_rows: default_num_rows(),
            num_cols: default_num_cols(),
            inf_seed: 0,
            gen_seed: 0,
            num_chains: None,
            num_iters: default_num_iters(),
            max_mu_grid: default_max_mu_grid(),
            max_s_grid: default_max_s_grid(),
            probe_columns: default_probe_columns(),
            num_values: default_num_values(),
            forward_workers: None,
            threads: 0,
        }
    }
}

/// Read a config file: JSON for `.json`, YAML otherwise.
pub fn read_config(path: &Path) -> Result<GewekeConfig> {
    let bytes = std::fs::read(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let cfg: GewekeConfig = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        serde_yaml_ng::from_slice(&bytes)?
    };
    Ok(cfg)
}

/// Run parameters as reported alongside the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    /// Rows of the synthetic dataset.
    pub num_rows: usize,
    /// Columns of the synthetic dataset.
    pub num_cols: usize,
    /// Half-width of the `mu` grid.
    pub max_mu_grid: f64,
    /// Upper end of the `s` grid.
    pub max_s_grid: f64,
    /// Forward samples drawn (`num_chains * chain_num_iters`).
    pub total_num_iters: usize,
    /// Iterations per posterior chain.
    pub chain_num_iters: usize,
    /// Posterior chains.
    pub num_chains: usize,
}

impl RunParameters {
    /// `(key, value)` pairs in a fixed order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("num_rows", self.num_rows.to_string()),
            ("num_cols", self.num_cols.to_string()),
            ("max_mu_grid", self.max_mu_grid.to_string()),
            ("max_s_grid", self.max_s_grid.to_string()),
            ("total_num_iters", self.total_num_iters.to_string()),
            ("chain_num_iters", self.chain_num_iters.to_string()),
            ("num_chains", self.num_chains.to_string()),
        ]
    }
}

/// A validated, fully-resolved run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Shared immutable inputs.
    pub context: SamplingContext,
    /// Posterior chains.
    pub num_chains: usize,
    /// Iterations per chain.
    pub chain_num_iters: usize,
    /// Forward samples in total.
    pub total_forward_samples: usize,
    /// Forward-sampling workers.
    pub forward_workers: usize,
    /// Base seed for posterior chains.
    pub inf_seed: u64,
    /// Base seed for forward sampling.
    pub gen_seed: u64,
    /// Dispatch mode.
    pub execution: Execution,
    /// Reported parameters.
    pub parameters: RunParameters,
}

impl RunPlan {
    /// One engine seed per posterior chain.
    pub fn chain_seeds(&self) -> Vec<u64> {
        derive_seeds(self.inf_seed, SeedDomain::Posterior, self.num_chains)
    }

    /// One engine seed per forward-sampling worker.
    pub fn forward_seeds(&self) -> Vec<u64> {
        derive_seeds(self.gen_seed, SeedDomain::Forward, self.forward_workers)
    }
}

/// `(num_chains, iterations per chain)`: with more than one chain the budget
/// is divided between them.
pub fn arbitrate_num_chains(num_chains: Option<usize>, num_iters: usize) -> (usize, usize) {
    match num_chains {
        Some(1) => (1, num_iters),
        Some(n) => (n, if n == 0 { 0 } else { num_iters / n }),
        None => {
            let n = available_workers();
            (n, num_iters / n)
        }
    }
}

/// Upper end of the `s` grid, derived from the `mu` grid when not given.
pub fn arbitrate_max_s_grid(num_rows: usize, max_mu_grid: f64, max_s_grid: Option<f64>) -> f64 {
    max_s_grid.unwrap_or_else(|| max_mu_grid * max_mu_grid / 3.0 * num_rows as f64)
}

impl GewekeConfig {
    /// Validate and resolve into a [`RunPlan`]. Fails before any sampling.
    pub fn resolve(&self) -> Result<RunPlan> {
        if self.num_rows == 0 || self.num_cols == 0 {
            return Err(Error::Configuration(format!(
                "dataset must have rows and columns, got {}x{}",
                self.num_rows, self.num_cols
            )));
        }
        for (i, &c) in self.probe_columns.iter().enumerate() {
            if c >= self.num_cols {
                return Err(Error::Configuration(format!(
                    "probe column {c} out of range for {} columns",
                    self.num_cols
                )));
            }
            if self.probe_columns[..i].contains(&c) {
                return Err(Error::Configuration(format!("probe column {c} listed twice")));
            }
        }

        let (num_chains, chain_num_iters) = arbitrate_num_chains(self.num_chains, self.num_iters);
        if num_chains == 0 || chain_num_iters == 0 {
            return Err(Error::Configuration(format!(
                "{} iterations cannot feed {num_chains} chains",
                self.num_iters
            )));
        }
        let forward_workers = self.forward_workers.unwrap_or_else(available_workers);
        if forward_workers == 0 {
            return Err(Error::Configuration("forward_workers must be > 0".to_string()));
        }

        let max_s_grid = arbitrate_max_s_grid(self.num_rows, self.max_mu_grid, self.max_s_grid);
        let grids = HyperGrids::new(self.max_mu_grid, max_s_grid)?;

        let column_types: Vec<ColumnType> = (0..self.num_cols)
            .map(|i| {
                if i == 0 {
                    ColumnType::Continuous
                } else {
                    ColumnType::Multinomial { cardinality: self.num_values }
                }
            })
            .collect();
        let metadata = DatasetMetadata::from_column_types(&column_types)
            .map_err(|e| Error::Configuration(e.to_string()))?;

        let total_forward_samples = num_chains * chain_num_iters;
        let parameters = RunParameters {
            num_rows: self.num_rows,
            num_cols: self.num_cols,
            max_mu_grid: self.max_mu_grid,
            max_s_grid,
            total_num_iters: total_forward_samples,
            chain_num_iters,
            num_chains,
        };

        Ok(RunPlan {
            context: SamplingContext {
                metadata,
                table: zero_table(self.num_rows, self.num_cols),
                grids,
                probe_columns: self.probe_columns.clone(),
            },
            num_chains,
            chain_num_iters,
            total_forward_samples,
            forward_workers,
            inf_seed: self.inf_seed,
            gen_seed: self.gen_seed,
            execution: Execution::from_threads(self.threads),
            parameters,
        })
    }
}
