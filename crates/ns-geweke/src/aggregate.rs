//! Merging per-worker diagnostic collections.

use std::collections::BTreeMap;

use ns_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::collection::DiagnosticCollection;

/// Concatenate forward-sampling collections, per variable, in worker order.
///
/// Workers that drew zero samples are skipped. The remaining collections must
/// share one variable set.
pub fn merge_forward(collections: Vec<DiagnosticCollection>) -> Result<DiagnosticCollection> {
    let mut merged: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut keys: Option<Vec<String>> = None;

    for (worker, collection) in collections.into_iter().enumerate() {
        if collection.is_empty() {
            continue;
        }
        let names: Vec<String> = collection.names().map(str::to_string).collect();
        match keys.as_ref() {
            Some(expected) if *expected != names => {
                return Err(Error::Configuration(format!(
                    "forward worker {worker} produced variables {names:?}, expected {expected:?}"
                )));
            }
            Some(_) => {}
            None => keys = Some(names),
        }
        for (name, series) in collection.into_series() {
            merged.entry(name).or_default().extend(series);
        }
    }

    DiagnosticCollection::from_series(merged)
}

/// Everything sampled in one run: the pooled forward reference and the
/// per-chain posterior trajectories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatedDataset {
    /// Forward samples, concatenated across workers.
    pub forward: DiagnosticCollection,
    /// One collection per posterior chain, in chain order.
    pub chains: Vec<DiagnosticCollection>,
}

impl AggregatedDataset {
    /// Variables of the forward reference, sorted.
    pub fn variable_names(&self) -> Vec<String> {
        self.forward.names().map(str::to_string).collect()
    }

    /// Number of posterior chains.
    pub fn n_chains(&self) -> usize {
        self.chains.len()
    }

    /// Series of `name` from every chain; `None` entries mark chains missing it.
    pub fn chain_series(&self, name: &str) -> Vec<Option<&[f64]>> {
        self.chains.iter().map(|c| c.series(name)).collect()
    }
}
