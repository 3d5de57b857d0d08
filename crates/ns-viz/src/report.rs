//! Geweke report: per-variable histograms and KL curves, summary KLs, and
//! the on-disk layout of a report directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ns_core::{Error, Result};
use ns_geweke::{DivergenceSeries, GewekeResult, RunParameters, VariableOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::histogram::{HistogramArtifact, render_histogram};
use crate::strategy::{RenderStrategy, StrategyTable, variable_label};

/// Prefix of report directory names.
pub const DEFAULT_DIRECTORY_PREFIX: &str = "geweke_plots";

/// Provenance of a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    /// Producing crate.
    pub tool: String,
    /// Version of `tool`.
    pub tool_version: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_unix_ms: u128,
}

/// Everything plotted for one variable.
#[derive(Debug, Clone, Serialize)]
pub struct VariablePanel {
    /// Diagnostic variable name.
    pub name: String,
    /// Human-readable axis label.
    pub label: String,
    /// How both histograms were binned.
    pub strategy: RenderStrategy,
    /// Forward samples.
    pub forward: HistogramArtifact,
    /// Samples of the chain picked for display.
    pub posterior: HistogramArtifact,
    /// Index of the chain shown in `posterior`.
    pub posterior_chain: usize,
    /// One divergence series per chain.
    pub kl_series: Vec<DivergenceSeries>,
}

/// Outcome of rendering one variable.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VariableReport {
    /// Histograms and KL curves.
    Rendered(Box<VariablePanel>),
    /// Scoring or binning failed for this variable.
    Failed {
        /// Why.
        reason: String,
    },
}

impl VariableReport {
    /// The panel if rendering succeeded.
    pub fn panel(&self) -> Option<&VariablePanel> {
        match self {
            VariableReport::Rendered(panel) => Some(&**panel),
            VariableReport::Failed { .. } => None,
        }
    }
}

/// Report of one Geweke run.
#[derive(Debug, Clone, Serialize)]
pub struct GewekeReport {
    /// Report format identifier.
    pub schema_version: String,
    /// Provenance.
    pub meta: ReportMeta,
    /// Parameters of the run.
    pub parameters: RunParameters,
    /// Per-variable outcome, keyed by variable name.
    pub variables: BTreeMap<String, VariableReport>,
    /// Last divergence of every chain, per rendered variable.
    pub final_kls: BTreeMap<String, Vec<Option<f64>>>,
    /// Mean of `final_kls` per variable.
    pub summary_kls: BTreeMap<String, Option<f64>>,
}

fn now_unix_ms() -> Result<u128> {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Computation(format!("system time error: {}", e)))?;
    Ok(d.as_millis())
}

fn build_panel(
    result: &GewekeResult,
    name: &str,
    strategies: &StrategyTable,
    rng: &mut StdRng,
) -> Result<VariablePanel> {
    let kl_series = match result.scores.get(name) {
        Some(VariableOutcome::Scored { series }) => series.clone(),
        Some(VariableOutcome::Failed { reason }) => return Err(Error::Computation(reason.clone())),
        None => return Err(Error::Computation(format!("'{name}' was not scored"))),
    };
    let forward = result
        .data
        .forward
        .series(name)
        .ok_or_else(|| Error::Computation(format!("no forward samples for '{name}'")))?;

    let n_chains = result.data.n_chains();
    if n_chains == 0 {
        return Err(Error::Computation("no posterior chains".to_string()));
    }
    let posterior_chain = rng.random_range(0..n_chains);
    let posterior = result.data.chains[posterior_chain].series(name).ok_or_else(|| {
        Error::Computation(format!("chain {posterior_chain} has no samples for '{name}'"))
    })?;

    let strategy = strategies.resolve(name);
    Ok(VariablePanel {
        name: name.to_string(),
        label: variable_label(name),
        strategy,
        forward: render_histogram(forward, strategy)?,
        posterior: render_histogram(posterior, strategy)?,
        posterior_chain,
        kl_series,
    })
}

/// Build the report for a finished run.
///
/// The displayed chain of each variable is drawn with an RNG seeded by
/// `plot_seed`. A variable that cannot be rendered is recorded as failed and
/// the rest of the report is unaffected.
pub fn build_report(
    result: &GewekeResult,
    strategies: &StrategyTable,
    plot_seed: u64,
) -> Result<GewekeReport> {
    let mut rng = StdRng::seed_from_u64(plot_seed);
    let mut variables = BTreeMap::new();
    for name in result.data.variable_names() {
        let entry = match build_panel(result, &name, strategies, &mut rng) {
            Ok(panel) => VariableReport::Rendered(Box::new(panel)),
            Err(e) => {
                log::warn!("failed to render {name}: {e}");
                VariableReport::Failed { reason: e.to_string() }
            }
        };
        variables.insert(name, entry);
    }

    let final_kls = final_kls(&variables);
    let summary_kls = summary_kls(&final_kls);
    Ok(GewekeReport {
        schema_version: "geweke_report_v0".to_string(),
        meta: ReportMeta {
            tool: "ns-geweke".to_string(),
            tool_version: ns_core::VERSION.to_string(),
            created_unix_ms: now_unix_ms()?,
        },
        parameters: result.parameters.clone(),
        variables,
        final_kls,
        summary_kls,
    })
}

/// Last entry of every chain's divergence series, per rendered variable.
pub fn final_kls(variables: &BTreeMap<String, VariableReport>) -> BTreeMap<String, Vec<Option<f64>>> {
    variables
        .iter()
        .filter_map(|(name, v)| v.panel().map(|p| (name, p)))
        .map(|(name, p)| (name.clone(), p.kl_series.iter().map(DivergenceSeries::last).collect()))
        .collect()
}

/// Mean of the final KLs per variable; undefined if any chain's is.
pub fn summary_kls(final_kls: &BTreeMap<String, Vec<Option<f64>>>) -> BTreeMap<String, Option<f64>> {
    final_kls
        .iter()
        .map(|(name, finals)| {
            let defined: Option<Vec<f64>> = finals.iter().copied().collect();
            let mean = defined
                .filter(|v| !v.is_empty())
                .map(|v| v.iter().sum::<f64>() / v.len() as f64);
            (name.clone(), mean)
        })
        .collect()
}

/// `<prefix>_` followed by `key=value` for every parameter, concatenated.
pub fn directory_name(prefix: &str, parameters: &RunParameters) -> String {
    let parts: String = parameters.entries().iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{prefix}_{parts}")
}

/// `key = value` lines: run parameters, then `final_kls` and `summary_kls` as JSON.
pub fn parameters_text(report: &GewekeReport) -> Result<String> {
    let mut lines: Vec<String> =
        report.parameters.entries().iter().map(|(k, v)| format!("{k} = {v}")).collect();
    lines.push(format!("final_kls = {}", serde_json::to_string(&report.final_kls)?));
    lines.push(format!("summary_kls = {}", serde_json::to_string(&report.summary_kls)?));
    Ok(lines.join("\n"))
}

#[derive(Serialize)]
struct SavedParameters<'a> {
    #[serde(flatten)]
    parameters: &'a RunParameters,
    final_kls: &'a BTreeMap<String, Vec<Option<f64>>>,
    summary_kls: &'a BTreeMap<String, Option<f64>>,
}

/// Write the report under `root` and return the report directory.
///
/// Layout: `parameters.txt`, `parameters.json`, and one
/// `<variable>_hist.json` per rendered variable.
pub fn write_report(root: &Path, report: &GewekeReport) -> Result<PathBuf> {
    let dir = root.join(directory_name(DEFAULT_DIRECTORY_PREFIX, &report.parameters));
    std::fs::create_dir_all(&dir)?;

    std::fs::write(dir.join("parameters.txt"), parameters_text(report)? + "\n")?;
    let saved = SavedParameters {
        parameters: &report.parameters,
        final_kls: &report.final_kls,
        summary_kls: &report.summary_kls,
    };
    std::fs::write(dir.join("parameters.json"), serde_json::to_vec_pretty(&saved)?)?;

    for (name, variable) in &report.variables {
        if let Some(panel) = variable.panel() {
            std::fs::write(dir.join(format!("{name}_hist.json")), serde_json::to_vec_pretty(panel)?)?;
        }
    }
    log::info!("report written to {}", dir.display());
    Ok(dir)
}
