//! Run reports and side-by-side comparisons.

use std::fmt;
use std::time::Duration;

use crate::frequency::{CountStrategy, KeyCountSnapshot};
use crate::store::TopUpStrategy;
use crate::verify::Verdict;

/// Result of one top-up run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TopUpReport {
    /// Strategy the store was built with.
    pub strategy: TopUpStrategy,
    /// Entries present before any top-up task ran.
    pub initial_size: usize,
    /// Entries present after quiescence.
    pub final_size: usize,
    /// Size the run aimed for.
    pub target: usize,
    /// Wall-clock time from dispatch to quiescence.
    #[cfg_attr(feature = "serde", serde(serialize_with = "duration_ms::serialize"))]
    pub elapsed: Duration,
    /// Cardinality check against `target`.
    pub verdict: Verdict,
}

impl TopUpReport {
    /// Entries above (positive) or below (negative) the target.
    pub fn deviation(&self) -> i64 {
        self.final_size as i64 - self.target as i64
    }
}

/// Result of one counting run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CountReport {
    /// Strategy the counter was built with.
    pub strategy: CountStrategy,
    /// Counts per key after quiescence.
    pub snapshot: KeyCountSnapshot,
    /// Wall-clock time from dispatch to quiescence.
    #[cfg_attr(feature = "serde", serde(serialize_with = "duration_ms::serialize"))]
    pub elapsed: Duration,
    /// Sum of counts against the number of increments issued.
    pub sum_verdict: Verdict,
    /// Key set against the domain.
    pub domain_verdict: Verdict,
}

impl CountReport {
    /// Whether both checks held.
    pub fn passed(&self) -> bool {
        self.sum_verdict.passed && self.domain_verdict.passed
    }
}

/// One named, timed entry of a [`Comparison`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TimedRun {
    /// Run name, usually the strategy.
    pub name: String,
    /// Wall-clock duration.
    #[cfg_attr(feature = "serde", serde(serialize_with = "duration_ms::serialize"))]
    pub elapsed: Duration,
    /// Whether the run's checks held.
    pub passed: bool,
}

/// Several runs timed one after the other, like a stopwatch with laps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Comparison {
    /// Runs in execution order.
    pub runs: Vec<TimedRun>,
}

impl Comparison {
    /// Appends a run.
    pub fn push(&mut self, name: impl Into<String>, elapsed: Duration, passed: bool) {
        self.runs.push(TimedRun {
            name: name.into(),
            elapsed,
            passed,
        });
    }

    /// Sum of all run durations.
    pub fn total(&self) -> Duration {
        self.runs.iter().map(|run| run.elapsed).sum()
    }

    /// Fraction of the total spent in `run`, in percent.
    pub fn share(&self, run: &TimedRun) -> f64 {
        let total = self.total().as_secs_f64();
        if total == 0.0 {
            0.0
        } else {
            run.elapsed.as_secs_f64() / total * 100.0
        }
    }

    /// The quickest run.
    pub fn fastest(&self) -> Option<&TimedRun> {
        self.runs.iter().min_by_key(|run| run.elapsed)
    }

    /// Looks a run up by name.
    pub fn get(&self, name: &str) -> Option<&TimedRun> {
        self.runs.iter().find(|run| run.name == name)
    }

    /// Whether every run's checks held.
    pub fn all_passed(&self) -> bool {
        self.runs.iter().all(|run| run.passed)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "running time = {:?}", self.total())?;
        writeln!(f, "{:-<48}", "")?;
        writeln!(f, "{:>12}  {:>6}  {:<6}  name", "ms", "%", "check")?;
        writeln!(f, "{:-<48}", "")?;
        for run in &self.runs {
            writeln!(
                f,
                "{:>12.3}  {:>5.1}%  {:<6}  {}",
                run.elapsed.as_secs_f64() * 1000.0,
                self.share(run),
                if run.passed { "pass" } else { "FAIL" },
                run.name
            )?;
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
pub(crate) mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1000.0)
    }
}

#[cfg(feature = "serde")]
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Comparison {
        let mut comparison = Comparison::default();
        comparison.push("lock-free", Duration::from_millis(25), true);
        comparison.push("locked", Duration::from_millis(75), true);
        comparison
    }

    #[test]
    fn test_total_and_share() {
        let comparison = sample();
        assert_eq!(comparison.total(), Duration::from_millis(100));
        let locked = comparison.get("locked").unwrap();
        assert!((comparison.share(locked) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_fastest() {
        assert_eq!(sample().fastest().unwrap().name, "lock-free");
        assert!(Comparison::default().fastest().is_none());
    }

    #[test]
    fn test_share_of_empty_total() {
        let mut comparison = Comparison::default();
        comparison.push("instant", Duration::ZERO, true);
        assert_eq!(comparison.share(&comparison.runs[0]), 0.0);
    }

    #[test]
    fn test_display() {
        let rendered = sample().to_string();
        assert!(rendered.starts_with("running time = 100ms"));
        assert!(rendered.contains("lock-free"));
        assert!(rendered.contains("75.0%"));
    }

    #[test]
    fn test_deviation() {
        let report = TopUpReport {
            strategy: TopUpStrategy::Unsynchronized,
            initial_size: 900,
            final_size: 1100,
            target: 1000,
            elapsed: Duration::ZERO,
            verdict: Verdict::fail("cardinality 1100, expected 1000"),
        };
        assert_eq!(report.deviation(), 100);
    }
}
