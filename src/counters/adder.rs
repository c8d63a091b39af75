//! Additive accumulator with sharded atomic storage.
//!
//! [`Adder`] is the per-key accumulator used by the lock-free frequency
//! counter. Increments go to the calling thread's shard; [`Adder::sum`]
//! folds all shards into a single integer.

use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::counters::{NUM_COMPONENTS, THREAD_SLOT_INDEX};

/// A high-concurrency additive accumulator.
///
/// Instead of a single atomic word (which every incrementing core would have
/// to own exclusively), `Adder` spreads updates across 64 cache-line-padded
/// slots and only aggregates them when a total is requested.
///
/// # Examples
///
/// ```rust
/// use corsa::counters::Adder;
///
/// let adder = Adder::new();
/// adder.increment();
/// adder.add(4);
/// assert_eq!(adder.sum(), 5);
/// ```
///
/// Shared between threads:
///
/// ```rust
/// use corsa::counters::Adder;
/// use std::sync::Arc;
/// use std::thread;
///
/// let adder = Arc::new(Adder::new());
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let adder = Arc::clone(&adder);
///         thread::spawn(move || {
///             for _ in 0..1000 {
///                 adder.increment();
///             }
///         })
///     })
///     .collect();
///
/// for h in handles {
///     h.join().unwrap();
/// }
///
/// assert_eq!(adder.sum(), 4000);
/// ```
pub struct Adder {
    components: [CachePadded<AtomicUsize>; NUM_COMPONENTS],
}

impl Adder {
    /// Creates an accumulator with every shard at zero.
    pub const fn new() -> Self {
        const ZERO: CachePadded<AtomicUsize> = CachePadded::new(AtomicUsize::new(0));
        Adder {
            components: [ZERO; NUM_COMPONENTS],
        }
    }

    /// The calling thread's shard.
    #[inline]
    fn component(&self) -> &AtomicUsize {
        THREAD_SLOT_INDEX.with(|idx| &self.components[*idx])
    }

    /// Adds one to the calling thread's shard.
    #[inline]
    pub fn increment(&self) {
        self.add(1);
    }

    /// Adds `value` to the calling thread's shard. Lock-free.
    #[inline]
    pub fn add(&self, value: usize) {
        self.component().fetch_add(value, Ordering::Relaxed);
    }

    /// Folds all shards into a single total.
    ///
    /// Concurrent increments may or may not be included; the result is exact
    /// only once writers are quiescent.
    #[inline]
    pub fn sum(&self) -> u64 {
        self.components
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed) as u64)
            .sum()
    }
}

impl Default for Adder {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Adder {
    /// Formats the accumulator showing non-zero shards.
    ///
    /// Output format: `Adder{ [slot]:value [slot]:value ... }`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Adder{{")?;
        for (i, counter) in self.components.iter().enumerate() {
            let val = counter.load(Ordering::Relaxed);
            if val != 0 {
                write!(f, " [{i}]:{val}")?;
            }
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let adder = Adder::new();
        assert_eq!(adder.sum(), 0);
    }

    #[test]
    fn test_increment() {
        let adder = Adder::new();
        adder.increment();
        assert_eq!(adder.sum(), 1);
        adder.increment();
        adder.increment();
        assert_eq!(adder.sum(), 3);
    }

    #[test]
    fn test_add() {
        let adder = Adder::new();
        adder.add(5);
        adder.add(3);
        assert_eq!(adder.sum(), 8);
    }

    #[test]
    fn test_debug() {
        let adder = Adder::new();
        adder.add(5);
        let debug_str = format!("{:?}", adder);
        assert!(debug_str.starts_with("Adder{"));
        assert!(debug_str.contains(":5"));
        assert!(debug_str.ends_with("}"));
    }

    #[test]
    fn test_multiple_threads() {
        use std::sync::Arc;
        use std::thread;

        let adder = Arc::new(Adder::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let adder_clone = Arc::clone(&adder);
            let handle = thread::spawn(move || {
                for _ in 0..1000 {
                    adder_clone.increment();
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(adder.sum(), 8000);
    }

    #[test]
    fn test_static_adder() {
        static TOTAL: Adder = Adder::new();
        TOTAL.add(2);
        assert!(TOTAL.sum() >= 2);
    }
}
