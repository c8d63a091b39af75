//! Post-run invariant checks.
//!
//! These are pure reads taken after the quiescence barrier. A failing check
//! is a result, not an error: the unsynchronized top-up is expected to fail
//! [`check_cardinality`] some of the time.

use std::fmt;

use crate::frequency::{KeyCountSnapshot, KeyDomain};
use crate::store::KeyedStore;

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Verdict {
    /// Whether the invariant held.
    pub passed: bool,
    /// What was compared.
    pub message: String,
}

impl Verdict {
    /// A passing verdict.
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    /// A failing verdict.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }

    fn check(passed: bool, message: String) -> Self {
        Self { passed, message }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "PASS" } else { "FAIL" };
        write!(f, "{status}: {}", self.message)
    }
}

/// The store holds exactly `expected` entries.
pub fn check_cardinality<S: KeyedStore + ?Sized>(store: &S, expected: usize) -> Verdict {
    let actual = store.len();
    Verdict::check(
        actual == expected,
        format!("cardinality {actual}, expected {expected}"),
    )
}

/// The snapshot's counts add up to `expected`.
pub fn check_sum(snapshot: &KeyCountSnapshot, expected: u64) -> Verdict {
    let actual = snapshot.total();
    Verdict::check(
        actual == expected,
        format!("sum {actual}, expected {expected}"),
    )
}

/// The snapshot's key set is exactly `domain`: none missing, none extra.
pub fn check_domain(snapshot: &KeyCountSnapshot, domain: &KeyDomain) -> Verdict {
    let missing: Vec<&str> = domain
        .keys()
        .iter()
        .map(String::as_str)
        .filter(|key| snapshot.get(key).is_none())
        .collect();
    let extra: Vec<&str> = snapshot.keys().filter(|key| !domain.contains(key)).collect();

    if missing.is_empty() && extra.is_empty() {
        Verdict::pass(format!("key set matches domain of {}", domain.len()))
    } else {
        Verdict::fail(format!(
            "key set differs from domain of {}: missing {:?}, extra {:?}",
            domain.len(),
            missing,
            extra
        ))
    }
}
