//! Geweke test orchestration: forward sampling, posterior chains, scoring.

use std::collections::BTreeMap;
use std::time::Instant;

use ns_core::{EngineFactory, Result};
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregatedDataset, merge_forward};
use crate::collection::DiagnosticCollection;
use crate::config::{RunParameters, RunPlan};
use crate::driver::{SamplingContext, run_forward_samples, run_posterior_chain};
use crate::executor::{Execution, fan_out, install, split_samples};
use crate::kl::{DivergenceSeries, kl_series_with};

/// Outcome of scoring one diagnostic variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VariableOutcome {
    /// One divergence series per posterior chain, in chain order.
    Scored {
        /// Per-chain divergence series.
        series: Vec<DivergenceSeries>,
    },
    /// Scoring failed for this variable; the rest of the run is unaffected.
    Failed {
        /// Why.
        reason: String,
    },
}

impl VariableOutcome {
    /// Per-chain series if scored.
    pub fn series(&self) -> Option<&[DivergenceSeries]> {
        match self {
            VariableOutcome::Scored { series } => Some(series),
            VariableOutcome::Failed { .. } => None,
        }
    }
}

/// Score `name` for every chain against the forward reference.
///
/// Windows are scored in parallel unless `execution` is sequential; run under
/// [`install`] to keep them inside the run's thread budget.
pub fn score_variable(data: &AggregatedDataset, name: &str, execution: Execution) -> VariableOutcome {
    let Some(forward) = data.forward.series(name) else {
        return VariableOutcome::Failed { reason: format!("no forward samples for '{name}'") };
    };
    if forward.is_empty() {
        return VariableOutcome::Failed { reason: format!("forward series for '{name}' is empty") };
    }
    let mut series = Vec::with_capacity(data.n_chains());
    for (chain, posterior) in data.chain_series(name).into_iter().enumerate() {
        match posterior {
            Some(p) => series.push(kl_series_with(forward, p, execution)),
            None => {
                return VariableOutcome::Failed {
                    reason: format!("chain {chain} has no samples for '{name}'"),
                };
            }
        }
    }
    VariableOutcome::Scored { series }
}

/// Score every forward variable within `execution`'s thread budget.
///
/// Per-variable failures are logged and recorded, not raised; the only error
/// is failing to build the thread pool.
pub fn score_all(
    data: &AggregatedDataset,
    execution: Execution,
) -> Result<BTreeMap<String, VariableOutcome>> {
    install(execution, || {
        let mut out = BTreeMap::new();
        for name in data.variable_names() {
            let outcome = score_variable(data, &name, execution);
            if let VariableOutcome::Failed { reason } = &outcome {
                log::warn!("failed to score {name}: {reason}");
            }
            out.insert(name, outcome);
        }
        out
    })
}

/// Everything a Geweke run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GewekeResult {
    /// Reported run parameters.
    pub parameters: RunParameters,
    /// Forward reference and per-chain trajectories.
    pub data: AggregatedDataset,
    /// Per-variable scoring outcome.
    pub scores: BTreeMap<String, VariableOutcome>,
    /// Wall time of the whole run, in seconds.
    pub wall_s: f64,
}

impl GewekeResult {
    /// Names of variables whose scoring failed.
    pub fn failed_variables(&self) -> Vec<&str> {
        self.scores
            .iter()
            .filter(|(_, o)| matches!(o, VariableOutcome::Failed { .. }))
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// Drives a Geweke test against engines built by `factory`.
pub struct GewekeTester<F: EngineFactory> {
    factory: F,
    plan: RunPlan,
}

impl<F: EngineFactory> GewekeTester<F> {
    /// New tester for a resolved plan.
    pub fn new(factory: F, plan: RunPlan) -> Self {
        Self { factory, plan }
    }

    /// The plan this tester runs.
    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// Draw the forward reference: the total sample count split across
    /// workers, each with its own seed, concatenated afterwards.
    pub fn run_forward(&self) -> Result<DiagnosticCollection> {
        let plan = &self.plan;
        sample_forward(
            &self.factory,
            &plan.context,
            plan.total_forward_samples,
            &plan.forward_seeds(),
            plan.execution,
        )
    }

    /// Run every posterior chain for the full per-chain budget.
    pub fn run_posterior(&self) -> Result<Vec<DiagnosticCollection>> {
        let plan = &self.plan;
        sample_posterior(
            &self.factory,
            &plan.context,
            plan.chain_num_iters,
            &plan.chain_seeds(),
            plan.execution,
        )
    }

    /// Forward sampling, posterior chains, then scoring.
    pub fn run(&self) -> Result<GewekeResult> {
        let start = Instant::now();

        log::info!("generating {} forward samples", self.plan.total_forward_samples);
        let forward = self.run_forward()?;

        log::info!(
            "generating posterior samples: {} chains x {} iterations",
            self.plan.num_chains,
            self.plan.chain_num_iters
        );
        let chains = self.run_posterior()?;

        let data = AggregatedDataset { forward, chains };
        let scores = score_all(&data, self.plan.execution)?;

        Ok(GewekeResult {
            parameters: self.plan.parameters.clone(),
            data,
            scores,
            wall_s: start.elapsed().as_secs_f64(),
        })
    }
}

/// Forward-sample `total` prior draws, one partition per seed.
pub fn sample_forward<F: EngineFactory>(
    factory: &F,
    ctx: &SamplingContext,
    total: usize,
    seeds: &[u64],
    execution: Execution,
) -> Result<DiagnosticCollection> {
    let sizes = split_samples(total, seeds.len())?;
    let parts = fan_out(seeds, execution, |i, seed| {
        let mut engine = factory.create(seed)?;
        let collection = run_forward_samples(&mut engine, ctx, sizes[i])?;
        log::debug!("forward partition {i}: {} samples", collection.len());
        Ok(collection)
    })?;
    merge_forward(parts)
}

/// Run one posterior chain of `n_iters` iterations per seed.
pub fn sample_posterior<F: EngineFactory>(
    factory: &F,
    ctx: &SamplingContext,
    n_iters: usize,
    seeds: &[u64],
    execution: Execution,
) -> Result<Vec<DiagnosticCollection>> {
    fan_out(seeds, execution, |i, seed| {
        let mut engine = factory.create(seed)?;
        let collection = run_posterior_chain(&mut engine, ctx, n_iters)?;
        log::debug!("chain {i}: {} iterations", collection.len());
        Ok(collection)
    })
}
