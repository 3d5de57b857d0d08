//! Common data types shared between the harness and inference engines.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Resolution of every hyperparameter search grid handed to the engine.
pub const GRID_RESOLUTION: usize = 31;

/// Dense row-major dataset (`rows x columns`).
pub type Table = Vec<Vec<f64>>;

/// A `rows x cols` table filled with zeros.
pub fn zero_table(n_rows: usize, n_cols: usize) -> Table {
    vec![vec![0.0; n_cols]; n_rows]
}

/// One cell of a table, addressed by row and column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// Row index.
    pub row: usize,
    /// Column index.
    pub col: usize,
}

/// Distributional type of a data column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnType {
    /// Real-valued column (normal / inverse-gamma family).
    Continuous,
    /// Categorical column with values coded `0..cardinality`.
    Multinomial {
        /// Number of distinct values.
        cardinality: usize,
    },
}

impl ColumnType {
    /// Model-family tag as understood by the engine.
    pub fn model_type(&self) -> &'static str {
        match self {
            ColumnType::Continuous => "normal_inverse_gamma",
            ColumnType::Multinomial { .. } => "symmetric_dirichlet_discrete",
        }
    }
}

/// Per-column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name.
    pub name: String,
    /// Distributional type.
    pub column_type: ColumnType,
    /// Value -> code mapping (empty for continuous columns).
    pub value_to_code: BTreeMap<String, usize>,
    /// Code -> value mapping (empty for continuous columns).
    pub code_to_value: BTreeMap<usize, String>,
}

impl ColumnMetadata {
    fn new(name: String, column_type: ColumnType) -> Self {
        let (value_to_code, code_to_value) = match column_type {
            ColumnType::Continuous => (BTreeMap::new(), BTreeMap::new()),
            ColumnType::Multinomial { cardinality } => (
                (0..cardinality).map(|v| (v.to_string(), v)).collect(),
                (0..cardinality).map(|v| (v, v.to_string())).collect(),
            ),
        };
        Self { name, column_type, value_to_code, code_to_value }
    }
}

/// Column metadata for a dataset: index <-> name maps plus per-column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Per-column metadata, in column-index order.
    pub columns: Vec<ColumnMetadata>,
    /// Name -> column index.
    pub name_to_idx: BTreeMap<String, usize>,
}

impl DatasetMetadata {
    /// Build synthetic metadata from a list of column types.
    ///
    /// Column names are the stringified column indices.
    pub fn from_column_types(types: &[ColumnType]) -> Result<Self> {
        let mut columns = Vec::with_capacity(types.len());
        for (idx, column_type) in types.iter().enumerate() {
            if matches!(column_type, ColumnType::Multinomial { cardinality: 0 }) {
                return Err(Error::Validation(format!(
                    "multinomial column {idx} needs a positive cardinality"
                )));
            }
            columns.push(ColumnMetadata::new(idx.to_string(), *column_type));
        }
        let name_to_idx = columns.iter().enumerate().map(|(i, c)| (c.name.clone(), i)).collect();
        Ok(Self { columns, name_to_idx })
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Column index for `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_idx.get(name).copied()
    }

    /// Column name for `idx`.
    pub fn column_name(&self, idx: usize) -> Option<&str> {
        self.columns.get(idx).map(|c| c.name.as_str())
    }

    /// Column type for `idx`.
    pub fn column_type(&self, idx: usize) -> Option<ColumnType> {
        self.columns.get(idx).map(|c| c.column_type)
    }

    /// Query cells covering every column of `row`.
    pub fn query_cells(&self, row: usize) -> Vec<Cell> {
        (0..self.n_columns()).map(|col| Cell { row, col }).collect()
    }
}

/// Row index <-> name map for a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMetadata {
    /// Row names, in row-index order.
    pub names: Vec<String>,
}

impl RowMetadata {
    /// Row metadata for every row of `table`.
    pub fn from_table(table: &Table) -> Self {
        Self { names: (0..table.len()).map(|i| i.to_string()).collect() }
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.names.len()
    }
}

/// Chinese-restaurant-process partition: concentration plus assignments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CrpPartition {
    /// Concentration parameter.
    pub alpha: f64,
    /// Cluster index per item.
    pub assignments: Vec<usize>,
}

/// State of one view (a group of columns sharing a row clustering).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewState {
    /// Row partition of this view.
    pub row_partition: CrpPartition,
}

/// Latent (structural + hyperparameter) state of the inference engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LatentState {
    /// Partition of columns into views.
    pub column_partition: CrpPartition,
    /// Per-column hyperparameters, keyed by hyperparameter name.
    pub column_hypers: Vec<BTreeMap<String, f64>>,
    /// Per-view state, in view order.
    pub view_states: Vec<ViewState>,
}

/// Row-cluster assignments per view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartitionState {
    /// `row_assignments[view][row]` is the cluster of `row` in `view`.
    pub row_assignments: Vec<Vec<usize>>,
}

impl PartitionState {
    /// Number of rows covered by the partition.
    pub fn n_rows(&self) -> usize {
        self.row_assignments.first().map_or(0, Vec::len)
    }
}

/// Hyperparameter search grids passed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperGrids {
    /// Precision (`s`) grid.
    pub s_grid: Vec<f64>,
    /// Mean (`mu`) grid.
    pub mu_grid: Vec<f64>,
}

impl HyperGrids {
    /// `mu` spans `[-max_mu, max_mu]`, `s` spans `[0, max_s]`, both linear with
    /// [`GRID_RESOLUTION`] points.
    pub fn new(max_mu: f64, max_s: f64) -> Result<Self> {
        Self::with_resolution(max_mu, max_s, GRID_RESOLUTION)
    }

    /// Like [`HyperGrids::new`] with an explicit resolution.
    pub fn with_resolution(max_mu: f64, max_s: f64, n: usize) -> Result<Self> {
        if n < 2 {
            return Err(Error::Configuration(format!(
                "hyperparameter grid needs at least 2 points, got {n}"
            )));
        }
        if !(max_mu.is_finite() && max_mu > 0.0) {
            return Err(Error::Configuration(format!("max_mu_grid must be > 0, got {max_mu}")));
        }
        if !(max_s.is_finite() && max_s > 0.0) {
            return Err(Error::Configuration(format!("max_s_grid must be > 0, got {max_s}")));
        }
        Ok(Self { s_grid: linspace(0.0, max_s, n), mu_grid: linspace(-max_mu, max_mu, n) })
    }
}

/// `n` evenly spaced points over `[start, stop]`, endpoints included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| if i == n - 1 { stop } else { start + step * i as f64 }).collect()
        }
    }
}

/// How the engine should initialize latent state.
#[derive(Debug, Clone, Copy)]
pub enum InitMode<'a> {
    /// Draw structure and hyperparameters from the prior with default grids.
    FromThePrior,
    /// Draw from the prior using the given hyperparameter grids.
    WithGrids(&'a HyperGrids),
}
