//! Diagnostic variable discovery and extraction.
//!
//! A run's variable set is frozen from the first latent-state snapshot:
//! two structural concentration parameters that are always present, plus
//! every hyperparameter of each probe column except the reserved keys.
//! Later snapshots are validated against the frozen set; a probe column
//! whose hyperparameter keys change is a fatal configuration error.

use std::collections::{BTreeMap, BTreeSet};

use ns_core::{Error, LatentState, Result};

/// Name of the column-partition CRP concentration variable.
pub const COLUMN_CRP_ALPHA: &str = "column_crp_alpha";
/// Name of the first view's row-partition CRP concentration variable.
pub const VIEW_0_CRP_ALPHA: &str = "view_0_crp_alpha";
/// Column hyperparameter keys that are never tracked.
pub const RESERVED_HYPER_KEYS: [&str; 2] = ["fixed", "K"];

/// One diagnostic snapshot: variable name -> value.
pub type Snapshot = BTreeMap<String, f64>;

/// Where a diagnostic variable reads its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// `column_partition.alpha`.
    ColumnCrpAlpha,
    /// `view_states[view].row_partition.alpha`.
    ViewCrpAlpha {
        /// View index.
        view: usize,
    },
    /// `column_hypers[column][key]`.
    ColumnHyper {
        /// Column index.
        column: usize,
        /// Hyperparameter name.
        key: String,
    },
}

/// A named scalar read out of latent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticVariable {
    /// Unique variable name.
    pub name: String,
    /// Extraction rule.
    pub rule: Extraction,
}

impl DiagnosticVariable {
    fn column_hyper(column: usize, key: &str) -> Self {
        Self {
            name: format!("col_{column}_{key}"),
            rule: Extraction::ColumnHyper { column, key: key.to_string() },
        }
    }

    /// Read this variable from `state`.
    pub fn extract(&self, state: &LatentState) -> Result<f64> {
        match &self.rule {
            Extraction::ColumnCrpAlpha => Ok(state.column_partition.alpha),
            Extraction::ViewCrpAlpha { view } => state
                .view_states
                .get(*view)
                .map(|v| v.row_partition.alpha)
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "{}: latent state has no view {view}",
                        self.name
                    ))
                }),
            Extraction::ColumnHyper { column, key } => state
                .column_hypers
                .get(*column)
                .and_then(|h| h.get(key))
                .copied()
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "{}: column {column} has no hyperparameter '{key}'",
                        self.name
                    ))
                }),
        }
    }
}

/// Tracked hyperparameter keys of `column`: its key set minus the reserved keys.
pub fn probe_keys(state: &LatentState, column: usize) -> Result<BTreeSet<String>> {
    let hypers = state.column_hypers.get(column).ok_or_else(|| {
        Error::Configuration(format!(
            "probe column {column} out of range ({} columns in latent state)",
            state.column_hypers.len()
        ))
    })?;
    Ok(hypers.keys().filter(|k| !RESERVED_HYPER_KEYS.contains(&k.as_str())).cloned().collect())
}

/// The frozen set of diagnostic variables of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSet {
    variables: Vec<DiagnosticVariable>,
    probe_keys: BTreeMap<usize, BTreeSet<String>>,
}

impl VariableSet {
    /// Discover the variable set from the first snapshot of a run.
    pub fn discover(state: &LatentState, probe_columns: &[usize]) -> Result<Self> {
        let mut variables = vec![
            DiagnosticVariable { name: COLUMN_CRP_ALPHA.to_string(), rule: Extraction::ColumnCrpAlpha },
            DiagnosticVariable {
                name: VIEW_0_CRP_ALPHA.to_string(),
                rule: Extraction::ViewCrpAlpha { view: 0 },
            },
        ];
        let mut frozen = BTreeMap::new();
        for &column in probe_columns {
            if frozen.contains_key(&column) {
                return Err(Error::Configuration(format!("probe column {column} listed twice")));
            }
            let keys = probe_keys(state, column)?;
            variables.extend(keys.iter().map(|k| DiagnosticVariable::column_hyper(column, k)));
            frozen.insert(column, keys);
        }

        let mut seen = BTreeSet::new();
        for v in &variables {
            if !seen.insert(v.name.as_str()) {
                return Err(Error::Configuration(format!(
                    "duplicate diagnostic variable name '{}'",
                    v.name
                )));
            }
        }

        let set = Self { variables, probe_keys: frozen };
        // The discovering snapshot must itself be extractable.
        set.extract(state)?;
        Ok(set)
    }

    /// Variables in extraction order.
    pub fn variables(&self) -> &[DiagnosticVariable] {
        &self.variables
    }

    /// Variable names in extraction order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Always false for a discovered set (the structural variables are fixed).
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Extract every variable from `state`.
    ///
    /// Fails if any probe column's key set differs from the frozen one.
    pub fn extract(&self, state: &LatentState) -> Result<Snapshot> {
        for (&column, frozen) in &self.probe_keys {
            let current = probe_keys(state, column)?;
            if &current != frozen {
                return Err(Error::Configuration(format!(
                    "hyperparameter keys of probe column {column} changed: expected {frozen:?}, got {current:?}"
                )));
            }
        }
        self.variables.iter().map(|v| Ok((v.name.clone(), v.extract(state)?))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ns_core::{CrpPartition, ViewState};

    fn state(alpha: f64, view_alpha: f64) -> LatentState {
        let continuous: BTreeMap<String, f64> =
            [("fixed", 0.0), ("mu", 1.5), ("nu", 2.0), ("r", 3.0), ("s", 4.0)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
        let multinomial: BTreeMap<String, f64> = [("fixed", 0.0), ("K", 2.0), ("dirichlet_alpha", 0.7)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        LatentState {
            column_partition: CrpPartition { alpha, assignments: vec![0, 0] },
            column_hypers: vec![continuous, multinomial],
            view_states: vec![ViewState {
                row_partition: CrpPartition { alpha: view_alpha, assignments: vec![0; 4] },
            }],
        }
    }

    #[test]
    fn test_discover_excludes_reserved_keys() {
        let set = VariableSet::discover(&state(1.0, 2.0), &[0, 1]).unwrap();
        let names: Vec<&str> = set.names().collect();
        assert_eq!(
            names,
            vec![
                "column_crp_alpha",
                "view_0_crp_alpha",
                "col_0_mu",
                "col_0_nu",
                "col_0_r",
                "col_0_s",
                "col_1_dirichlet_alpha",
            ]
        );
    }

    #[test]
    fn test_extract_values() {
        let set = VariableSet::discover(&state(1.0, 2.0), &[0]).unwrap();
        let snap = set.extract(&state(0.25, 8.0)).unwrap();
        assert_eq!(snap[COLUMN_CRP_ALPHA], 0.25);
        assert_eq!(snap[VIEW_0_CRP_ALPHA], 8.0);
        assert_eq!(snap["col_0_s"], 4.0);
        assert_eq!(snap.len(), set.len());
    }

    #[test]
    fn test_changed_keys_are_fatal() {
        let set = VariableSet::discover(&state(1.0, 2.0), &[0]).unwrap();
        let mut s = state(1.0, 2.0);
        s.column_hypers[0].insert("extra".to_string(), 1.0);
        let err = set.extract(&s).unwrap_err();
        assert!(err.is_configuration());

        let mut s = state(1.0, 2.0);
        s.column_hypers[0].remove("mu");
        assert!(set.extract(&s).unwrap_err().is_configuration());
    }

    #[test]
    fn test_reserved_key_changes_are_ignored() {
        let set = VariableSet::discover(&state(1.0, 2.0), &[1]).unwrap();
        let mut s = state(1.0, 2.0);
        s.column_hypers[1].insert("K".to_string(), 5.0);
        assert!(set.extract(&s).is_ok());
    }

    #[test]
    fn test_probe_column_out_of_range() {
        assert!(VariableSet::discover(&state(1.0, 2.0), &[2]).unwrap_err().is_configuration());
        assert!(VariableSet::discover(&state(1.0, 2.0), &[0, 0]).unwrap_err().is_configuration());
    }

    #[test]
    fn test_missing_view_is_fatal() {
        let mut s = state(1.0, 2.0);
        s.view_states.clear();
        assert!(VariableSet::discover(&s, &[]).unwrap_err().is_configuration());
    }
}
