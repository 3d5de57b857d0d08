//! End-to-end Geweke runs against a seeded stub engine.

mod common;

use common::{StubEngine, StubKnobs, context};
use ns_core::Error;
use ns_geweke::tester::{sample_forward, sample_posterior};
use ns_geweke::{
    AggregatedDataset, COLUMN_CRP_ALPHA, Execution, GewekeConfig, GewekeTester, MIN_WINDOW,
    SeedDomain, VIEW_0_CRP_ALPHA, VariableOutcome, derive_seeds, kl_series, run_forward_samples,
    run_posterior_chain, sample_table, score_all,
};

fn factory(knobs: StubKnobs) -> impl Fn(u64) -> StubEngine + Sync {
    move |seed| StubEngine::new(seed, knobs.clone())
}

fn forward_seeds(base: u64, workers: usize) -> Vec<u64> {
    derive_seeds(base, SeedDomain::Forward, workers)
}

fn chain_seeds(base: u64, chains: usize) -> Vec<u64> {
    derive_seeds(base, SeedDomain::Posterior, chains)
}

#[test]
fn test_single_chain_scenario() {
    let ctx = context(10, 2, vec![1]);
    let f = factory(StubKnobs::default());

    let forward = sample_forward(&f, &ctx, 50, &forward_seeds(3, 1), Execution::Sequential).unwrap();
    let chains = sample_posterior(&f, &ctx, 20, &chain_seeds(4, 1), Execution::Sequential).unwrap();
    assert_eq!(forward.len(), 50);
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].len(), 20);

    let data = AggregatedDataset { forward, chains };
    assert_eq!(
        data.variable_names(),
        vec![
            "col_1_dirichlet_alpha".to_string(),
            COLUMN_CRP_ALPHA.to_string(),
            VIEW_0_CRP_ALPHA.to_string()
        ]
    );

    let scores = score_all(&data, Execution::Sequential).unwrap();
    assert_eq!(scores.len(), 3);
    for (name, outcome) in &scores {
        let series = outcome.series().unwrap_or_else(|| panic!("{name} failed"));
        assert_eq!(series.len(), 1);
        let s = &series[0];
        assert_eq!(s.len(), 20, "{name}");
        for i in 0..MIN_WINDOW {
            assert_eq!(s.values()[i], None, "{name}[{i}]");
        }
        for v in s.values().iter().flatten() {
            assert!(v.is_finite() && *v >= 0.0, "{name}: {v}");
        }
    }
}

#[test]
fn test_posterior_records_iterations_in_order() {
    let ctx = context(5, 2, vec![0]);
    let mut engine = StubEngine::new(11, StubKnobs { inject: Some((7, 123.0)), ..Default::default() });
    let chain = run_posterior_chain(&mut engine, &ctx, 15).unwrap();

    assert_eq!(chain.len(), 15);
    assert_eq!(engine.analyze_calls, 15);
    assert_eq!(engine.initialize_calls, 1);
    let alpha = chain.series(COLUMN_CRP_ALPHA).unwrap();
    assert_eq!(alpha[7], 123.0);
    assert_eq!(alpha.iter().filter(|&&a| a == 123.0).count(), 1);
}

#[test]
fn test_posterior_regenerates_table_each_iteration() {
    let ctx = context(6, 3, vec![0]);
    let mut engine = StubEngine::new(5, StubKnobs::default());
    run_posterior_chain(&mut engine, &ctx, 4).unwrap();

    assert_eq!(engine.seen_tables.len(), 4);
    assert_eq!(engine.seen_tables[0], ctx.table);
    for table in &engine.seen_tables[1..] {
        assert_eq!(table.len(), 6);
        assert!(table.iter().all(|row| row.len() == 3));
        // Continuous column 0 is a normal draw, so it cannot stay all zero.
        assert!(table.iter().any(|row| row[0] != 0.0));
        assert!(table.iter().all(|row| row[1] == 0.0 || row[1] == 1.0));
    }
}

#[test]
fn test_forward_samples_never_analyze() {
    let ctx = context(5, 2, vec![0, 1]);
    let mut engine = StubEngine::new(1, StubKnobs::default());
    let collection = run_forward_samples(&mut engine, &ctx, 12).unwrap();
    assert_eq!(collection.len(), 12);
    assert_eq!(engine.initialize_calls, 12);
    assert_eq!(engine.analyze_calls, 0);
    // Probe column 0 contributes mu, nu, r and s; column 1 contributes dirichlet_alpha.
    assert_eq!(collection.names().count(), 2 + 4 + 1);
    assert!(collection.series("col_0_fixed").is_none());
    assert!(collection.series("col_1_K").is_none());
}

#[test]
fn test_forward_total_survives_uneven_split() {
    let ctx = context(4, 2, vec![1]);
    let f = factory(StubKnobs::default());
    for workers in [1, 3, 7] {
        let seeds = forward_seeds(9, workers);
        let forward =
            sample_forward(&f, &ctx, 100, &seeds, Execution::Parallel { threads: 2 }).unwrap();
        assert_eq!(forward.len(), 100, "{workers} workers");
    }
    // More workers than samples: idle workers contribute nothing.
    let forward = sample_forward(&f, &ctx, 3, &forward_seeds(9, 5), Execution::Sequential).unwrap();
    assert_eq!(forward.len(), 3);
}

#[test]
fn test_failed_chain_surfaces_as_worker_error() {
    let ctx = context(4, 2, vec![0]);
    let f = factory(StubKnobs { fail_at: Some(3), ..Default::default() });
    let err = sample_posterior(&f, &ctx, 10, &chain_seeds(0, 2), Execution::Parallel { threads: 2 })
        .unwrap_err();
    match err {
        Error::Worker { source, .. } => assert!(matches!(*source, Error::Engine(_))),
        other => panic!("expected worker error, got {other:?}"),
    }
}

#[test]
fn test_key_change_is_configuration_error() {
    let ctx = context(4, 2, vec![0]);
    let mut engine = StubEngine::new(2, StubKnobs { extra_key_from: Some(2), ..Default::default() });
    let err = run_posterior_chain(&mut engine, &ctx, 5).unwrap_err();
    assert!(err.is_configuration(), "{err}");

    let f = factory(StubKnobs { extra_key_from: Some(2), ..Default::default() });
    let err = sample_posterior(&f, &ctx, 5, &chain_seeds(0, 1), Execution::Sequential).unwrap_err();
    assert!(matches!(err, Error::Worker { .. }));
    assert!(err.is_configuration());
}

#[test]
fn test_sample_table_shape() {
    let ctx = context(7, 4, vec![0]);
    let mut engine = StubEngine::new(8, StubKnobs::default());
    let (latent, partition) = {
        let rows = ns_core::RowMetadata::from_table(&ctx.table);
        use ns_core::InferenceEngine;
        engine
            .initialize(&ctx.metadata, &rows, &ctx.table, ns_core::InitMode::FromThePrior)
            .unwrap()
    };
    let table = sample_table(&mut engine, &ctx.metadata, &latent, &partition, 7).unwrap();
    assert_eq!(table.len(), 7);
    assert!(table.iter().all(|row| row.len() == 4));
}

#[test]
fn test_sequential_and_parallel_agree() {
    let cfg = GewekeConfig {
        num_rows: 6,
        num_cols: 3,
        inf_seed: 21,
        gen_seed: 22,
        num_chains: Some(3),
        num_iters: 90,
        forward_workers: Some(4),
        threads: 1,
        ..Default::default()
    };
    let sequential = GewekeTester::new(factory(StubKnobs::default()), cfg.resolve().unwrap())
        .run()
        .unwrap();
    let parallel = GewekeTester::new(
        factory(StubKnobs::default()),
        GewekeConfig { threads: 3, ..cfg.clone() }.resolve().unwrap(),
    )
    .run()
    .unwrap();

    assert_eq!(sequential.data.forward, parallel.data.forward);
    assert_eq!(sequential.data.chains, parallel.data.chains);
    assert_eq!(sequential.scores, parallel.scores);
}

#[test]
fn test_default_seeds_keep_forward_and_chains_independent() {
    // inf_seed and gen_seed both default to 0.
    let cfg = GewekeConfig {
        num_rows: 5,
        num_cols: 2,
        num_iters: 20,
        num_chains: Some(1),
        forward_workers: Some(1),
        threads: 1,
        ..Default::default()
    };
    assert_eq!(cfg.inf_seed, cfg.gen_seed);
    let plan = cfg.resolve().unwrap();
    let chain_seeds = plan.chain_seeds();
    assert!(plan.forward_seeds().iter().all(|s| !chain_seeds.contains(s)));

    let result = GewekeTester::new(factory(StubKnobs::default()), plan).run().unwrap();
    let forward = &result.data.forward;
    let chain = &result.data.chains[0];
    let names = result.data.variable_names();
    assert!(forward.len() > 1);
    // No forward draw may replay the chain's first iteration.
    for j in 0..forward.len() {
        let replayed = names
            .iter()
            .all(|n| forward.series(n).unwrap()[j] == chain.series(n).unwrap()[0]);
        assert!(!replayed, "forward sample {j} equals chain iteration 0");
    }
}

#[test]
fn test_tester_run_from_config() {
    let cfg = GewekeConfig {
        num_rows: 5,
        num_cols: 2,
        num_chains: Some(2),
        num_iters: 60,
        forward_workers: Some(3),
        threads: 2,
        ..Default::default()
    };
    let tester = GewekeTester::new(factory(StubKnobs::default()), cfg.resolve().unwrap());
    assert_eq!(tester.plan().chain_num_iters, 30);
    assert_eq!(tester.plan().total_forward_samples, 60);

    let result = tester.run().unwrap();
    assert_eq!(result.data.forward.len(), 60);
    assert_eq!(result.data.n_chains(), 2);
    assert!(result.data.chains.iter().all(|c| c.len() == 30));
    assert!(result.failed_variables().is_empty());
    assert_eq!(result.parameters.total_num_iters, 60);
    for outcome in result.scores.values() {
        for s in outcome.series().unwrap() {
            assert_eq!(s.len(), 30);
        }
    }
}

#[test]
fn test_correct_sampler_converges_and_biased_one_does_not() {
    let ctx = context(4, 2, vec![1]);

    let f = factory(StubKnobs::default());
    let forward = sample_forward(&f, &ctx, 2000, &forward_seeds(1, 2), Execution::Sequential).unwrap();
    let chain = sample_posterior(&f, &ctx, 2000, &chain_seeds(2, 1), Execution::Sequential).unwrap();
    let s = kl_series(
        forward.series(COLUMN_CRP_ALPHA).unwrap(),
        chain[0].series(COLUMN_CRP_ALPHA).unwrap(),
    );
    assert!(s.last().unwrap() < 0.05, "{:?}", s.last());

    let biased = factory(StubKnobs { biased_alpha: Some(2.0), ..Default::default() });
    let chain =
        sample_posterior(&biased, &ctx, 2000, &chain_seeds(2, 1), Execution::Sequential).unwrap();
    let data = AggregatedDataset { forward, chains: chain };
    let scores = score_all(&data, Execution::Sequential).unwrap();
    match &scores[COLUMN_CRP_ALPHA] {
        VariableOutcome::Scored { series } => assert_eq!(series[0].last(), None),
        other => panic!("{other:?}"),
    }
    // Variables the bias does not touch still score.
    assert!(scores["col_1_dirichlet_alpha"].series().unwrap()[0].last().is_some());
}
