//! Per-worker diagnostic time series.

use std::collections::BTreeMap;

use ns_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::extract::Snapshot;

/// Variable name -> series of values, one entry per driver step.
///
/// Every series in a collection has the same length. The key set is fixed by
/// the first pushed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticCollection {
    series: BTreeMap<String, Vec<f64>>,
    len: usize,
}

impl DiagnosticCollection {
    /// Empty collection; keys are taken from the first snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from already-complete series.
    pub fn from_series(series: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        let mut lens = series.values().map(Vec::len);
        let len = lens.next().unwrap_or(0);
        if lens.any(|l| l != len) {
            return Err(Error::Validation("diagnostic series have unequal lengths".to_string()));
        }
        Ok(Self { series, len })
    }

    /// Append one snapshot.
    pub fn push(&mut self, snapshot: Snapshot) -> Result<()> {
        if self.len == 0 && self.series.is_empty() {
            self.series = snapshot.into_iter().map(|(k, v)| (k, vec![v])).collect();
            self.len = 1;
            return Ok(());
        }
        if snapshot.len() != self.series.len()
            || !snapshot.keys().all(|k| self.series.contains_key(k))
        {
            return Err(Error::Configuration(format!(
                "diagnostic snapshot keys {:?} do not match collection keys {:?}",
                snapshot.keys().collect::<Vec<_>>(),
                self.series.keys().collect::<Vec<_>>()
            )));
        }
        for (k, v) in snapshot {
            if let Some(s) = self.series.get_mut(&k) {
                s.push(v);
            }
        }
        self.len += 1;
        Ok(())
    }

    /// Number of steps recorded.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no step has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Series for `name`.
    pub fn series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    /// Variable names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// `(name, series)` pairs, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.series.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Consume into the underlying map.
    pub fn into_series(self) -> BTreeMap<String, Vec<f64>> {
        self.series
    }
}
