//! Shared keyed store and its top-up strategies.
//!
//! A [`SharedKeyedStore`] starts `seeded` with `target - deficit` entries.
//! Every top-up task then tries to bring the store back to `target` by
//! reading its size, computing the missing count and inserting that many
//! fresh entries. How that read-compute-insert sequence is protected is the
//! [`TopUpStrategy`]:
//!
//! | Strategy | Protection | Final size |
//! |----------|------------|------------|
//! | [`Unsynchronized`](TopUpStrategy::Unsynchronized) | none (check-then-act) | not guaranteed |
//! | [`CoarseLock`](TopUpStrategy::CoarseLock) | one lock around the whole sequence | exactly `target` |
//! | [`Reserving`](TopUpStrategy::Reserving) | CAS claim on a reservation cursor | exactly `target` |
//!
//! The underlying map is a concurrent hash map, so every single `len` or
//! `insert` is thread-safe on its own. The unsynchronized strategy is broken
//! anyway: two tasks can observe the same deficit and both fill it.
//!
//! ```text
//!   task A: len() = 900 ─────────── insert 100 ──►  1000
//!   task B:    len() = 900 ──────────── insert 100 ──►  1100
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

/// How a top-up task protects its read-compute-insert sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum TopUpStrategy {
    /// No atomicity between reading the size and inserting. Deliberately racy.
    Unsynchronized,
    /// The whole sequence runs under one store-wide mutex.
    CoarseLock,
    /// The deficit is claimed with a compare-and-swap before inserting.
    Reserving,
}

impl TopUpStrategy {
    /// All strategies, in the order the harness compares them.
    pub const ALL: [TopUpStrategy; 3] = [
        TopUpStrategy::Unsynchronized,
        TopUpStrategy::CoarseLock,
        TopUpStrategy::Reserving,
    ];

    /// Whether the strategy guarantees the final size equals the target.
    pub fn is_exact(self) -> bool {
        !matches!(self, TopUpStrategy::Unsynchronized)
    }

    /// Short, stable name used in reports and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TopUpStrategy::Unsynchronized => "unsynchronized",
            TopUpStrategy::CoarseLock => "coarse-lock",
            TopUpStrategy::Reserving => "reserving",
        }
    }
}

impl fmt::Display for TopUpStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read side of a keyed store, shared by every strategy.
///
/// The verifier and the harness only see this trait, never the strategy.
pub trait KeyedStore: Send + Sync {
    /// Current number of entries.
    fn len(&self) -> usize;

    /// Whether the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is present.
    fn contains_key(&self, key: &str) -> bool;

    /// Runs one top-up attempt and returns how many entries it inserted.
    fn top_up(&self) -> usize;
}

/// Generates `count` entries under fresh random keys.
///
/// Keys are v4 UUIDs, so they are unique without looking at the store.
/// Values run `1..=count`.
pub fn fresh_entries(count: usize) -> Vec<(String, i64)> {
    (1..=count as i64)
        .map(|value| (Uuid::new_v4().to_string(), value))
        .collect()
}

/// A string-to-integer map shared by every worker of a run.
///
/// # Examples
///
/// ```rust
/// use corsa::store::{KeyedStore, SharedKeyedStore, TopUpStrategy};
///
/// let store = SharedKeyedStore::seeded(TopUpStrategy::CoarseLock, 100, 90);
/// assert_eq!(store.len(), 90);
/// assert_eq!(store.top_up(), 10);
/// assert_eq!(store.top_up(), 0);
/// assert_eq!(store.len(), 100);
/// ```
pub struct SharedKeyedStore {
    entries: DashMap<String, i64>,
    strategy: TopUpStrategy,
    target: usize,
    /// Serializes top-ups under [`TopUpStrategy::CoarseLock`].
    lock: Mutex<()>,
    /// Size the store is committed to reach under [`TopUpStrategy::Reserving`].
    reserved: AtomicUsize,
}

impl SharedKeyedStore {
    /// Creates a store holding `seeded` fresh entries that top-ups will try
    /// to grow to `target`.
    pub fn seeded(strategy: TopUpStrategy, target: usize, seeded: usize) -> Self {
        let entries: DashMap<String, i64> = fresh_entries(seeded).into_iter().collect();
        let reserved = AtomicUsize::new(entries.len());
        Self {
            entries,
            strategy,
            target,
            lock: Mutex::new(()),
            reserved,
        }
    }

    /// The strategy chosen at construction.
    pub fn strategy(&self) -> TopUpStrategy {
        self.strategy
    }

    /// The size top-ups aim for.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Inserts every entry; existing keys are overwritten.
    pub fn put_all(&self, entries: Vec<(String, i64)>) {
        for (key, value) in entries {
            self.entries.insert(key, value);
        }
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<i64> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    /// Check-then-act with nothing in between.
    fn top_up_unsynchronized(&self) -> usize {
        let observed = self.entries.len();
        if observed >= self.target {
            return 0;
        }
        let deficit = self.target - observed;
        debug!(strategy = %self.strategy, observed, deficit, "topping up");

        // Give other workers the chance to observe the same size, so the
        // window opens even on a single core.
        thread::yield_now();

        self.put_all(fresh_entries(deficit));
        deficit
    }

    fn top_up_reserving(&self) -> usize {
        let claim = self
            .reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |reserved| {
                (reserved < self.target).then_some(self.target)
            });
        match claim {
            Ok(reserved) => {
                let deficit = self.target - reserved;
                debug!(strategy = %self.strategy, reserved, deficit, "claimed deficit");
                self.put_all(fresh_entries(deficit));
                deficit
            }
            Err(_) => 0,
        }
    }
}

impl KeyedStore for SharedKeyedStore {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn top_up(&self) -> usize {
        match self.strategy {
            TopUpStrategy::Unsynchronized => self.top_up_unsynchronized(),
            TopUpStrategy::CoarseLock => {
                let _guard = self.lock.lock();
                self.top_up_unsynchronized()
            }
            TopUpStrategy::Reserving => self.top_up_reserving(),
        }
    }
}

impl fmt::Debug for SharedKeyedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeyedStore")
            .field("strategy", &self.strategy)
            .field("target", &self.target)
            .field("len", &self.entries.len())
            .finish()
    }
}
