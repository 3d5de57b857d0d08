//! Parallel fan-out executor.
//!
//! Every partition is an independent unit of work: it receives its own seed
//! and returns its full result. The caller blocks until all partitions are
//! done; a failed partition surfaces as [`Error::Worker`] at that barrier.

use ns_core::{Error, Result};
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// How partitions are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Run partitions one after another on the calling thread.
    Sequential,
    /// Run partitions on a rayon pool (`threads == 0` uses the global pool).
    Parallel {
        /// Pool size; 0 = rayon default.
        threads: usize,
    },
}

impl Execution {
    /// `threads == 1` is sequential; anything else is parallel.
    pub fn from_threads(threads: usize) -> Self {
        if threads == 1 { Execution::Sequential } else { Execution::Parallel { threads } }
    }
}

/// Number of workers available for forward sampling.
pub fn available_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Independent seed streams of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedDomain {
    /// Posterior chains (from `inf_seed`).
    Posterior,
    /// Forward-sampling partitions (from `gen_seed`).
    Forward,
}

impl SeedDomain {
    fn tag(self) -> u64 {
        match self {
            SeedDomain::Posterior => 0x706f_7374_6572_696f,
            SeedDomain::Forward => 0x666f_7277_6172_6421,
        }
    }
}

/// Expand `base` into `n` worker seeds from one seeded stream.
///
/// Identical `(base, domain)` gives identical seeds, independent of execution
/// mode. The domain is part of the generator seed, so the two domains never
/// share a stream even when their base seeds are equal.
pub fn derive_seeds(base: u64, domain: SeedDomain, n: usize) -> Vec<u64> {
    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&base.to_le_bytes());
    key[8..16].copy_from_slice(&domain.tag().to_le_bytes());
    let mut rng = rand::rngs::StdRng::from_seed(key);
    (0..n).map(|_| rng.random::<u64>()).collect()
}

/// Run `op` under `execution`'s thread budget.
///
/// `Parallel { threads > 0 }` installs a dedicated pool, so rayon work inside
/// `op` is capped at `threads`. The other modes run `op` on the caller.
pub fn install<R, OP>(execution: Execution, op: OP) -> Result<R>
where
    R: Send,
    OP: FnOnce() -> R + Send,
{
    match execution {
        Execution::Parallel { threads } if threads > 0 => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::Computation(format!("failed to create thread pool: {e}")))?;
            Ok(pool.install(op))
        }
        _ => Ok(op()),
    }
}

/// Split `total` samples across `workers`: each gets `total / workers`, and
/// the first `total % workers` workers get one extra.
pub fn split_samples(total: usize, workers: usize) -> Result<Vec<usize>> {
    if workers == 0 {
        return Err(Error::Configuration("cannot split samples across zero workers".to_string()));
    }
    let base = total / workers;
    let extra = total % workers;
    Ok((0..workers).map(|i| if i < extra { base + 1 } else { base }).collect())
}

/// Run `work(partition_index, seed)` once per seed and collect the results in
/// partition order.
pub fn fan_out<T, F>(seeds: &[u64], execution: Execution, work: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize, u64) -> Result<T> + Sync,
{
    log::debug!("fan-out: {} partitions ({:?})", seeds.len(), execution);

    let run_one = |(i, &seed): (usize, &u64)| {
        work(i, seed).map_err(|e| {
            log::warn!("partition {i} failed: {e}");
            Error::worker(i, e)
        })
    };

    let results: Vec<Result<T>> = match execution {
        Execution::Sequential => seeds.iter().enumerate().map(run_one).collect(),
        Execution::Parallel { .. } => {
            install(execution, || seeds.par_iter().enumerate().map(run_one).collect())?
        }
    };

    let failed = results.iter().filter(|r| r.is_err()).count();
    log::debug!("fan-out finished: {} partitions, {failed} failed", results.len());
    results.into_iter().collect()
}
