//! Frequency counting over a small fixed key domain.
//!
//! Workers pick keys uniformly from a [`KeyDomain`] and bump that key's
//! count by one. Both [`CountStrategy`] variants are correct; they differ in
//! how much workers get in each other's way:
//!
//! - [`CountStrategy::Locked`]: a plain `HashMap` behind one mutex. Every
//!   increment from every worker serializes on that mutex.
//! - [`CountStrategy::LockFree`]: a concurrent map from key to [`Adder`].
//!   The accumulator for a key is created on first touch with an atomic
//!   compute-if-absent. A [`Recorder`] keeps the handle it got back, so
//!   every later increment of that key is a relaxed add on the caller's own
//!   shard and never touches the map again.
//!
//! ```text
//!   first touch:  entry(key).or_insert_with(Adder::new) ──► Arc<Adder> ─┐
//!   after that:   handles[index] ─────────────────────────────────────┴─► shard.fetch_add(1)
//! ```
//!
//! Whatever the strategy, a [`KeyCountSnapshot`] taken after quiescence
//! covers exactly the domain and its counts sum to the number of increments.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;

use crate::counters::Adder;

/// How increments are synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum CountStrategy {
    /// Read-modify-write under one counter-wide mutex.
    Locked,
    /// Per-key sharded accumulators created by compute-if-absent.
    LockFree,
}

impl CountStrategy {
    /// Short, stable name used in reports and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            CountStrategy::Locked => "locked",
            CountStrategy::LockFree => "lock-free",
        }
    }
}

impl fmt::Display for CountStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed set of keys a counter may see: `item0` .. `item{K-1}`.
///
/// Cheap to clone; the key strings are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDomain {
    keys: Arc<[String]>,
}

impl KeyDomain {
    /// Builds the domain `item0` .. `item{size-1}`.
    pub fn new(size: usize) -> Self {
        let keys: Vec<String> = (0..size).map(|i| format!("item{i}")).collect();
        Self { keys: keys.into() }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the domain has no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All keys, in index order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Whether `key` belongs to the domain.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Picks a key uniformly at random.
    ///
    /// # Panics
    ///
    /// Panics if the domain is empty.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> &str {
        &self.keys[self.pick_index(rng)]
    }

    /// Picks a key index uniformly at random.
    ///
    /// # Panics
    ///
    /// Panics if the domain is empty.
    pub fn pick_index<R: Rng>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.keys.len())
    }
}

/// Point-in-time counts per key, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct KeyCountSnapshot {
    counts: BTreeMap<String, u64>,
}

impl KeyCountSnapshot {
    /// Count recorded for `key`.
    pub fn get(&self, key: &str) -> Option<u64> {
        self.counts.get(key).copied()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no key is present.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// `(key, count)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, u64)> for KeyCountSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            counts: iter.into_iter().collect(),
        }
    }
}

enum Tally {
    Locked(Mutex<HashMap<String, u64>>),
    LockFree(DashMap<String, Arc<Adder>>),
}

/// Atomic compute-if-absent: the entry API holds the shard lock across check
/// and insert, so racing creators share one accumulator.
fn accumulator(freqs: &DashMap<String, Arc<Adder>>, key: &str) -> Arc<Adder> {
    if let Some(adder) = freqs.get(key) {
        return Arc::clone(adder.value());
    }
    Arc::clone(
        freqs
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Adder::new()))
            .value(),
    )
}

/// A thread-safe multiset counter over a [`KeyDomain`].
///
/// # Examples
///
/// ```rust
/// use corsa::frequency::{CountStrategy, FrequencyCounter, KeyDomain};
///
/// let counter = FrequencyCounter::new(CountStrategy::LockFree, KeyDomain::new(3));
/// counter.increment("item1");
/// counter.increment("item1");
///
/// let snapshot = counter.snapshot();
/// assert_eq!(snapshot.get("item0"), Some(0));
/// assert_eq!(snapshot.get("item1"), Some(2));
/// assert_eq!(snapshot.total(), 2);
/// ```
pub struct FrequencyCounter {
    domain: KeyDomain,
    strategy: CountStrategy,
    tally: Tally,
}

impl FrequencyCounter {
    /// Creates an empty counter over `domain`.
    pub fn new(strategy: CountStrategy, domain: KeyDomain) -> Self {
        let tally = match strategy {
            CountStrategy::Locked => {
                Tally::Locked(Mutex::new(HashMap::with_capacity(domain.len())))
            }
            CountStrategy::LockFree => Tally::LockFree(DashMap::with_capacity(domain.len())),
        };
        Self {
            domain,
            strategy,
            tally,
        }
    }

    /// The strategy chosen at construction.
    pub fn strategy(&self) -> CountStrategy {
        self.strategy
    }

    /// The key domain.
    pub fn domain(&self) -> &KeyDomain {
        &self.domain
    }

    /// Adds one to `key`'s count.
    ///
    /// Under [`CountStrategy::LockFree`] this looks the accumulator up in the
    /// map on every call; loops should go through a [`Recorder`].
    #[inline]
    pub fn increment(&self, key: &str) {
        match &self.tally {
            Tally::Locked(freqs) => {
                let mut freqs = freqs.lock();
                match freqs.get_mut(key) {
                    Some(count) => *count += 1,
                    None => {
                        freqs.insert(key.to_owned(), 1);
                    }
                }
            }
            Tally::LockFree(freqs) => accumulator(freqs, key).increment(),
        }
    }

    /// A per-task recorder over the domain keys.
    pub fn recorder(&self) -> Recorder<'_> {
        Recorder {
            counter: self,
            handles: vec![None; self.domain.len()],
        }
    }

    /// Performs `ops` increments on uniformly chosen domain keys.
    pub fn record_random(&self, ops: usize) {
        self.recorder().record_random(ops);
    }

    /// Captures the counts of every domain key, plus any key outside it.
    ///
    /// Domain keys never incremented appear with a count of zero. Only exact
    /// once writers are quiescent.
    pub fn snapshot(&self) -> KeyCountSnapshot {
        let mut counts: BTreeMap<String, u64> =
            self.domain.keys().iter().map(|k| (k.clone(), 0)).collect();
        match &self.tally {
            Tally::Locked(freqs) => {
                for (key, count) in freqs.lock().iter() {
                    counts.insert(key.clone(), *count);
                }
            }
            Tally::LockFree(freqs) => {
                for entry in freqs.iter() {
                    counts.insert(entry.key().clone(), entry.value().sum());
                }
            }
        }
        KeyCountSnapshot { counts }
    }
}

impl fmt::Debug for FrequencyCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrequencyCounter")
            .field("strategy", &self.strategy)
            .field("domain", &self.domain.len())
            .finish()
    }
}

/// Increments domain keys on behalf of one task.
///
/// Under [`CountStrategy::LockFree`] the recorder resolves each key's
/// accumulator once, on first use, and keeps the handle; workers sharing a
/// key then only meet on that key's [`Adder`]. Under
/// [`CountStrategy::Locked`] every increment takes the counter-wide mutex.
///
/// # Examples
///
/// ```rust
/// use corsa::frequency::{CountStrategy, FrequencyCounter, KeyDomain};
///
/// let counter = FrequencyCounter::new(CountStrategy::LockFree, KeyDomain::new(2));
/// let mut recorder = counter.recorder();
/// recorder.increment_index(1);
/// recorder.increment_index(1);
///
/// assert_eq!(counter.snapshot().get("item1"), Some(2));
/// ```
pub struct Recorder<'a> {
    counter: &'a FrequencyCounter,
    handles: Vec<Option<Arc<Adder>>>,
}

impl Recorder<'_> {
    /// Adds one to the count of the domain key at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the domain.
    #[inline]
    pub fn increment_index(&mut self, index: usize) {
        let counter = self.counter;
        let key = &counter.domain.keys()[index];
        match &counter.tally {
            Tally::Locked(_) => counter.increment(key),
            Tally::LockFree(freqs) => self.handles[index]
                .get_or_insert_with(|| accumulator(freqs, key))
                .increment(),
        }
    }

    /// Performs `ops` increments on uniformly chosen domain keys.
    pub fn record_random(&mut self, ops: usize) {
        let mut rng = rand::thread_rng();
        for _ in 0..ops {
            let index = self.counter.domain.pick_index(&mut rng);
            self.increment_index(index);
        }
    }
}

impl fmt::Debug for Recorder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("strategy", &self.counter.strategy)
            .field("resolved", &self.handles.iter().flatten().count())
            .finish()
    }
}
