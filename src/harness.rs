//! Orchestration of named runs.
//!
//! A [`Harness`] builds the shared structure for a run, dispatches the work
//! through a fresh [`WorkerPool`], blocks on the quiescence barrier, checks
//! the result and reports it together with the wall-clock time:
//!
//! ```text
//!   seed ──► submit ──► shutdown ──► await_quiescence ──► verify ──► report
//!                                          │
//!                                          └── timeout ──► Error::QuiescenceTimeout
//! ```
//!
//! Context runs are different: they model single requests arriving at a
//! server, so they go through one long-lived request pool whose workers are
//! recycled from call to call.

mod config;
mod report;

pub use config::HarnessConfig;
pub use report::{Comparison, CountReport, TimedRun, TopUpReport};

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::context::{ContextView, WorkerLocalContext};
use crate::error::{Error, Result};
use crate::frequency::{CountStrategy, FrequencyCounter, KeyDomain};
use crate::pool::{PoolConfig, WorkerPool};
use crate::store::{KeyedStore, SharedKeyedStore, TopUpStrategy};
use crate::verify;

/// Runs the hazard demonstrations against a fixed configuration.
///
/// # Examples
///
/// ```rust
/// use corsa::harness::{Harness, HarnessConfig};
///
/// let harness = Harness::new(HarnessConfig::default().with_loop_count(10_000)).unwrap();
///
/// let locked = harness.run_locked_top_up().unwrap();
/// assert_eq!(locked.final_size, 1000);
///
/// let counted = harness.run_lock_free_count().unwrap();
/// assert_eq!(counted.snapshot.total(), 10_000);
///
/// assert_eq!(harness.run_scoped_context(7).unwrap().before, None);
/// ```
pub struct Harness {
    config: HarnessConfig,
    requests: WorkerPool,
    leaking: Arc<WorkerLocalContext<u32>>,
    scoped: Arc<WorkerLocalContext<u32>>,
}

impl Harness {
    /// Validates `config` and starts the request pool.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let requests = WorkerPool::new(
            PoolConfig::default()
                .with_workers(config.workers)
                .with_thread_name_prefix("corsa-request"),
        )?;
        Ok(Self {
            config,
            requests,
            leaking: Arc::new(WorkerLocalContext::new()),
            scoped: Arc::new(WorkerLocalContext::new()),
        })
    }

    /// The configuration every run uses.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Top-up with no synchronization. The final size may miss the target.
    pub fn run_flawed_top_up(&self) -> Result<TopUpReport> {
        self.run_top_up(TopUpStrategy::Unsynchronized)
    }

    /// Top-up serialized by one store-wide lock. Always lands on the target.
    pub fn run_locked_top_up(&self) -> Result<TopUpReport> {
        self.run_top_up(TopUpStrategy::CoarseLock)
    }

    /// Top-up with a lock-free deficit reservation. Always lands on the target.
    pub fn run_reserving_top_up(&self) -> Result<TopUpReport> {
        self.run_top_up(TopUpStrategy::Reserving)
    }

    /// Seeds a store short of the target, dispatches `batches` top-up tasks
    /// and checks the final cardinality.
    pub fn run_top_up(&self, strategy: TopUpStrategy) -> Result<TopUpReport> {
        let target = self.config.target;
        let store = Arc::new(SharedKeyedStore::seeded(
            strategy,
            target,
            self.config.seeded(),
        ));
        let initial_size = store.len();
        info!(%strategy, initial_size, target, "store seeded");

        let started = Instant::now();
        let pool = self.spawn_pool()?;
        pool.submit((0..self.config.batches).map(|_| {
            let store = Arc::clone(&store);
            move || {
                store.top_up();
            }
        }))?;
        self.settle(&pool)?;
        let elapsed = started.elapsed();

        let final_size = store.len();
        let verdict = verify::check_cardinality(&*store, target);
        if verdict.passed {
            info!(%strategy, final_size, ?elapsed, "top-up finished");
        } else {
            warn!(%strategy, final_size, target, ?elapsed, "top-up missed target");
        }

        Ok(TopUpReport {
            strategy,
            initial_size,
            final_size,
            target,
            elapsed,
            verdict,
        })
    }

    /// Counting with one lock around every increment.
    pub fn run_locked_count(&self) -> Result<CountReport> {
        self.run_count(CountStrategy::Locked)
    }

    /// Counting with per-key sharded accumulators.
    pub fn run_lock_free_count(&self) -> Result<CountReport> {
        self.run_count(CountStrategy::LockFree)
    }

    /// Issues `loop_count` random increments over `key_count` keys, in tasks
    /// of `chunk_size`, and checks the sum and the key set.
    pub fn run_count(&self, strategy: CountStrategy) -> Result<CountReport> {
        let domain = KeyDomain::new(self.config.key_count);
        let counter = Arc::new(FrequencyCounter::new(strategy, domain.clone()));
        let loop_count = self.config.loop_count;
        let chunk_size = self.config.chunk_size;
        info!(%strategy, loop_count, keys = domain.len(), "counting started");

        let started = Instant::now();
        let pool = self.spawn_pool()?;
        pool.submit((0..loop_count).step_by(chunk_size).map(|start| {
            let counter = Arc::clone(&counter);
            let ops = chunk_size.min(loop_count - start);
            move || counter.record_random(ops)
        }))?;
        self.settle(&pool)?;
        let elapsed = started.elapsed();

        let snapshot = counter.snapshot();
        let sum_verdict = verify::check_sum(&snapshot, loop_count as u64);
        let domain_verdict = verify::check_domain(&snapshot, &domain);
        for verdict in [&sum_verdict, &domain_verdict] {
            if !verdict.passed {
                warn!(%strategy, %verdict, "counting check failed");
            }
        }
        info!(%strategy, total = snapshot.total(), ?elapsed, "counting finished");

        Ok(CountReport {
            strategy,
            snapshot,
            elapsed,
            sum_verdict,
            domain_verdict,
        })
    }

    /// Runs one request on a recycled worker and leaves its value in the
    /// worker's slot.
    pub fn run_leaking_context(&self, value: u32) -> Result<ContextView<u32>> {
        let context = Arc::clone(&self.leaking);
        self.requests.execute(move || context.leaking(value))
    }

    /// Runs one request on a recycled worker, clearing the slot on exit.
    pub fn run_scoped_context(&self, value: u32) -> Result<ContextView<u32>> {
        let context = Arc::clone(&self.scoped);
        self.requests.execute(move || context.scoped(value))
    }

    /// Times the lock-free counter, then the locked one.
    pub fn compare_counts(&self) -> Result<Comparison> {
        let mut comparison = Comparison::default();
        for strategy in [CountStrategy::LockFree, CountStrategy::Locked] {
            let report = self.run_count(strategy)?;
            comparison.push(strategy.as_str(), report.elapsed, report.passed());
        }
        Ok(comparison)
    }

    /// Times every top-up strategy in turn.
    pub fn compare_top_ups(&self) -> Result<Comparison> {
        let mut comparison = Comparison::default();
        for strategy in TopUpStrategy::ALL {
            let report = self.run_top_up(strategy)?;
            comparison.push(strategy.as_str(), report.elapsed, report.verdict.passed);
        }
        Ok(comparison)
    }

    fn spawn_pool(&self) -> Result<WorkerPool> {
        WorkerPool::new(PoolConfig::default().with_workers(self.config.workers))
    }

    /// Closes the pool and waits for it to drain. Expiry and task faults
    /// both fail the run.
    fn settle(&self, pool: &WorkerPool) -> Result<()> {
        pool.shutdown();
        let waited = self.config.quiescence_timeout;
        if !pool.await_quiescence(waited) {
            let pending = pool.pending();
            warn!(?waited, pending, "quiescence timeout");
            return Err(Error::QuiescenceTimeout { waited, pending });
        }
        let faults = pool.stats().faults;
        if faults > 0 {
            warn!(faults, "run had faulted tasks");
            return Err(Error::TaskFault { faults });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Harness {
        Harness::new(
            HarnessConfig::default()
                .with_workers(4)
                .with_loop_count(20_000)
                .with_chunk_size(1_000),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Harness::new(HarnessConfig::default().with_key_count(0));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_locked_top_up_report() {
        let report = small().run_locked_top_up().unwrap();
        assert_eq!(report.strategy, TopUpStrategy::CoarseLock);
        assert_eq!(report.initial_size, 900);
        assert_eq!(report.final_size, 1000);
        assert_eq!(report.deviation(), 0);
        assert!(report.verdict.passed);
    }

    #[test]
    fn test_reserving_top_up_report() {
        let report = small().run_reserving_top_up().unwrap();
        assert_eq!(report.final_size, 1000);
        assert!(report.verdict.passed);
    }

    #[test]
    fn test_count_reports() {
        let harness = small();
        for report in [
            harness.run_locked_count().unwrap(),
            harness.run_lock_free_count().unwrap(),
        ] {
            assert!(report.passed(), "{:?}", report.strategy);
            assert_eq!(report.snapshot.total(), 20_000);
            assert_eq!(report.snapshot.len(), 10);
        }
    }

    #[test]
    fn test_uneven_chunks() {
        let harness = Harness::new(
            HarnessConfig::default()
                .with_workers(3)
                .with_loop_count(1_001)
                .with_chunk_size(100),
        )
        .unwrap();
        assert_eq!(harness.run_locked_count().unwrap().snapshot.total(), 1_001);
    }

    #[test]
    fn test_empty_count() {
        let harness = Harness::new(HarnessConfig::default().with_loop_count(0)).unwrap();
        let report = harness.run_lock_free_count().unwrap();
        assert!(report.passed());
        assert_eq!(report.snapshot.total(), 0);
    }

    #[test]
    fn test_compare_counts() {
        let comparison = small().compare_counts().unwrap();
        assert_eq!(comparison.runs.len(), 2);
        assert_eq!(comparison.runs[0].name, "lock-free");
        assert_eq!(comparison.runs[1].name, "locked");
        assert!(comparison.all_passed());
    }

    #[test]
    fn test_compare_top_ups_names() {
        let comparison = small().compare_top_ups().unwrap();
        let names: Vec<_> = comparison.runs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["unsynchronized", "coarse-lock", "reserving"]);
        assert!(comparison.get("coarse-lock").unwrap().passed);
        assert!(comparison.get("reserving").unwrap().passed);
    }

    #[test]
    fn test_context_runs_on_request_workers() {
        let view = small().run_leaking_context(1).unwrap();
        assert!(view.worker.starts_with("corsa-request-"));
        assert_eq!(view.after, Some(1));
    }
}
