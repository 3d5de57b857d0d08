//! Per-variable histogram strategy selection and display labels.

use ns_core::{ColumnType, DatasetMetadata, GRID_RESOLUTION};
use serde::{Deserialize, Serialize};

/// How a variable's samples are binned for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderStrategy {
    /// One bin per distinct value (plus a trailing edge), log x-axis.
    LogUniqueBins,
    /// Clip to the 0.5 / 99.5 percentiles, then `n_bins` equal-width bins.
    ClippedLinear {
        /// Number of bins.
        n_bins: usize,
    },
}

/// Matches diagnostic variable names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePattern {
    /// Exactly this name.
    Exact(String),
    /// `col_<any>_<key>` for the given hyperparameter key.
    AnyColumnHyper(String),
}

impl NamePattern {
    /// True if `name` matches.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Exact(n) => n == name,
            NamePattern::AnyColumnHyper(key) => {
                split_column_hyper(name).is_some_and(|(_, hyper)| hyper == key)
            }
        }
    }
}

/// Hyperparameters of continuous columns drawn with linear bins.
const CONTINUOUS_HYPERS: [&str; 4] = ["s", "mu", "r", "nu"];

/// Ordered (pattern, strategy) rules; first match wins, else `fallback`.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyTable {
    rules: Vec<(NamePattern, RenderStrategy)>,
    fallback: RenderStrategy,
}

impl Default for StrategyTable {
    /// Column 0 is the continuous column of the standard synthetic dataset.
    fn default() -> Self {
        let mut table = Self::empty(RenderStrategy::LogUniqueBins);
        table.push_continuous_column(0);
        table
    }
}

impl StrategyTable {
    /// No rules; everything resolves to `fallback`.
    pub fn empty(fallback: RenderStrategy) -> Self {
        Self { rules: Vec::new(), fallback }
    }

    /// Linear bins for the hyperparameters of every continuous column.
    pub fn for_metadata(metadata: &DatasetMetadata) -> Self {
        let mut table = Self::empty(RenderStrategy::LogUniqueBins);
        for col in 0..metadata.n_columns() {
            if metadata.column_type(col) == Some(ColumnType::Continuous) {
                table.push_continuous_column(col);
            }
        }
        table
    }

    fn push_continuous_column(&mut self, col: usize) {
        for key in CONTINUOUS_HYPERS {
            self.rules.push((
                NamePattern::Exact(format!("col_{col}_{key}")),
                RenderStrategy::ClippedLinear { n_bins: GRID_RESOLUTION },
            ));
        }
    }

    /// Append a rule; earlier rules take precedence.
    pub fn with_rule(mut self, pattern: NamePattern, strategy: RenderStrategy) -> Self {
        self.rules.push((pattern, strategy));
        self
    }

    /// Strategy for `name`.
    pub fn resolve(&self, name: &str) -> RenderStrategy {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.matches(name))
            .map(|(_, strategy)| *strategy)
            .unwrap_or(self.fallback)
    }
}

/// Split `col_<idx>_<hyper>` into `(idx, hyper)`. The index may not contain `_`.
fn split_column_hyper(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix("col_")?;
    let (idx, hyper) = rest.split_once('_')?;
    Some((idx, hyper))
}

/// Human-readable label for a diagnostic variable name.
pub fn variable_label(name: &str) -> String {
    let Some((idx, hyper)) = split_column_hyper(name) else {
        return name.to_string();
    };
    let hyper = match hyper {
        "s" => "precision hyperparameter value",
        "nu" => "precision hyperparameter pseudo count",
        "mu" => "mean hyperparameter value",
        "r" => "mean hyperparameter pseudo count",
        other => other,
    };
    format!("column {idx} {hyper}")
}
