//! Harness configuration.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::pool::DEFAULT_WORKERS;

/// Parameters of every run the harness performs.
///
/// The defaults reproduce the classic demonstration: ten workers, a store of
/// 1000 entries seeded 100 short and topped up by ten tasks, ten million
/// increments over ten keys, and an hour-long quiescence bound.
///
/// # Examples
///
/// ```rust
/// use corsa::harness::HarnessConfig;
///
/// let config = HarnessConfig::default()
///     .with_workers(4)
///     .with_loop_count(100_000);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.seeded(), 900);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HarnessConfig {
    /// Worker threads per pool.
    pub workers: usize,
    /// Size the keyed store must reach.
    pub target: usize,
    /// How many entries short of `target` the store is seeded.
    pub deficit: usize,
    /// Number of top-up tasks dispatched per run.
    pub batches: usize,
    /// Total increments issued by a counting run.
    pub loop_count: usize,
    /// Size of the counting key domain.
    pub key_count: usize,
    /// Increments performed by one pool task.
    pub chunk_size: usize,
    /// Bound on the quiescence barrier; expiry fails the run.
    #[cfg_attr(feature = "serde", serde(with = "crate::harness::report::duration_secs"))]
    pub quiescence_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            target: 1000,
            deficit: 100,
            batches: 10,
            loop_count: 10_000_000,
            key_count: 10,
            chunk_size: 10_000,
            quiescence_timeout: Duration::from_secs(60 * 60),
        }
    }
}

impl HarnessConfig {
    /// Sets the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the target size and the seeding deficit.
    pub fn with_target(mut self, target: usize, deficit: usize) -> Self {
        self.target = target;
        self.deficit = deficit;
        self
    }

    /// Sets the number of top-up tasks.
    pub fn with_batches(mut self, batches: usize) -> Self {
        self.batches = batches;
        self
    }

    /// Sets the total number of increments.
    pub fn with_loop_count(mut self, loop_count: usize) -> Self {
        self.loop_count = loop_count;
        self
    }

    /// Sets the key domain size.
    pub fn with_key_count(mut self, key_count: usize) -> Self {
        self.key_count = key_count;
        self
    }

    /// Sets the increments per task.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the quiescence bound.
    pub fn with_quiescence_timeout(mut self, timeout: Duration) -> Self {
        self.quiescence_timeout = timeout;
        self
    }

    /// Number of entries the store starts with.
    pub fn seeded(&self) -> usize {
        self.target.saturating_sub(self.deficit)
    }

    /// Rejects configurations no run can honor.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        if self.workers == 0 {
            return invalid("workers must be at least 1");
        }
        if self.deficit > self.target {
            return invalid("deficit cannot exceed target");
        }
        if self.batches == 0 {
            return invalid("batches must be at least 1");
        }
        if self.key_count == 0 {
            return invalid("key_count must be at least 1");
        }
        if self.chunk_size == 0 {
            return invalid("chunk_size must be at least 1");
        }
        Ok(())
    }
}
