//! JSON observer for serializing run reports.
//!
//! This module provides [`JsonObserver`], which serializes any report the
//! harness produces ([`TopUpReport`](crate::harness::TopUpReport),
//! [`CountReport`](crate::harness::CountReport),
//! [`Comparison`](crate::harness::Comparison),
//! [`ContextView`](crate::context::ContextView), ...) using serde.
//!
//! # Feature Flag
//!
//! This module requires the `json` feature:
//!
//! ```toml
//! [dependencies]
//! corsa = { version = "0.1", features = ["json"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use corsa::harness::{Harness, HarnessConfig};
//! use corsa::observers::json::JsonObserver;
//!
//! let harness = Harness::new(HarnessConfig::default())?;
//! let report = harness.run_flawed_top_up()?;
//!
//! let json = JsonObserver::new().to_json(&report)?;
//! println!("{}", json);
//! // {"strategy":"unsynchronized","initial_size":900,"final_size":1090,...}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A report stamped with the time it was rendered.
///
/// # Examples
///
/// ```rust,ignore
/// use corsa::observers::json::Stamped;
///
/// let stamped = Stamped { timestamp_ms: Some(1_700_000_000_000), report: 42 };
/// let json = serde_json::to_string(&stamped).unwrap();
/// assert_eq!(json, r#"{"timestamp_ms":1700000000000,"report":42}"#);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stamped<T> {
    /// Optional timestamp in milliseconds since Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    /// The wrapped report.
    pub report: T,
}

/// Configuration for the JSON observer.
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    /// Whether to pretty-print the JSON output.
    pub pretty: bool,
    /// Whether to wrap the report in a [`Stamped`] object.
    pub stamped: bool,
}

/// An observer that serializes reports to JSON.
///
/// # Examples
///
/// ```rust,ignore
/// use corsa::observers::json::JsonObserver;
///
/// let observer = JsonObserver::new().pretty(true).stamped(true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonObserver {
    config: JsonConfig,
}

impl JsonObserver {
    /// Creates a new JSON observer with compact, unstamped output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new JSON observer with the specified configuration.
    pub fn with_config(config: JsonConfig) -> Self {
        Self { config }
    }

    /// Enables or disables pretty-printing.
    pub fn pretty(mut self, enabled: bool) -> Self {
        self.config.pretty = enabled;
        self
    }

    /// Enables or disables the timestamp wrapper.
    pub fn stamped(mut self, enabled: bool) -> Self {
        self.config.stamped = enabled;
        self
    }

    /// Serializes `report` to a JSON string.
    pub fn to_json<T: Serialize>(&self, report: &T) -> Result<String> {
        let json = if self.config.stamped {
            let stamped = Stamped {
                timestamp_ms: Some(current_timestamp_ms()),
                report,
            };
            self.encode(&stamped)?
        } else {
            self.encode(report)?
        };
        Ok(json)
    }

    /// Serializes `report` to a JSON byte vector.
    pub fn to_json_bytes<T: Serialize>(&self, report: &T) -> Result<Vec<u8>> {
        Ok(self.to_json(report)?.into_bytes())
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> serde_json::Result<String> {
        if self.config.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }
}

/// Returns the current timestamp in milliseconds since Unix epoch.
fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextView;
    use crate::frequency::{CountStrategy, KeyCountSnapshot};
    use crate::harness::{Comparison, CountReport, TopUpReport};
    use crate::store::TopUpStrategy;
    use crate::verify::Verdict;
    use std::time::Duration;

    fn top_up() -> TopUpReport {
        TopUpReport {
            strategy: TopUpStrategy::CoarseLock,
            initial_size: 900,
            final_size: 1000,
            target: 1000,
            elapsed: Duration::from_millis(2),
            verdict: Verdict::pass("cardinality 1000"),
        }
    }

    #[test]
    fn test_top_up_report() {
        let json = JsonObserver::new().to_json(&top_up()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["strategy"], "coarse-lock");
        assert_eq!(value["final_size"], 1000);
        assert_eq!(value["elapsed"], 2.0);
        assert_eq!(value["verdict"]["passed"], true);
    }

    #[test]
    fn test_count_report_snapshot_is_a_map() {
        let report = CountReport {
            strategy: CountStrategy::LockFree,
            snapshot: [("item0".to_string(), 3), ("item1".to_string(), 4)]
                .into_iter()
                .collect::<KeyCountSnapshot>(),
            elapsed: Duration::ZERO,
            sum_verdict: Verdict::pass("sum 7"),
            domain_verdict: Verdict::pass("2 keys"),
        };
        let json = JsonObserver::new().to_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["strategy"], "lock-free");
        assert_eq!(value["snapshot"]["item0"], 3);
        assert_eq!(value["snapshot"]["item1"], 4);
    }

    #[test]
    fn test_comparison() {
        let mut comparison = Comparison::default();
        comparison.push("lock-free", Duration::from_millis(1), true);
        comparison.push("locked", Duration::from_millis(3), true);
        let json = JsonObserver::new().to_json(&comparison).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["runs"][1]["name"], "locked");
    }

    #[test]
    fn test_context_view_null_slot() {
        let view = ContextView {
            worker: "w".to_string(),
            worker_id: None,
            before: None,
            after: Some(9u32),
        };
        let json = JsonObserver::new().to_json(&view).unwrap();
        assert_eq!(
            json,
            r#"{"worker":"w","worker_id":null,"before":null,"after":9}"#
        );
    }

    #[test]
    fn test_pretty() {
        let json = JsonObserver::new().pretty(true).to_json(&top_up()).unwrap();
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_stamped() {
        let json = JsonObserver::new().stamped(true).to_json(&top_up()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["timestamp_ms"].as_u64().unwrap() > 0);
        assert_eq!(value["report"]["target"], 1000);
    }

    #[test]
    fn test_bytes_match_string() {
        let observer = JsonObserver::new();
        let bytes = observer.to_json_bytes(&top_up()).unwrap();
        assert_eq!(bytes, observer.to_json(&top_up()).unwrap().into_bytes());
    }
}
