//! Table observer for pretty-printing run results.
//!
//! This module provides [`TableObserver`], which renders comparisons,
//! key-count snapshots, top-up reports and context views as tables using the
//! `tabled` crate.
//!
//! # Feature Flag
//!
//! This module requires the `table` feature:
//!
//! ```toml
//! [dependencies]
//! corsa = { version = "0.1", features = ["table"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use corsa::harness::{Harness, HarnessConfig};
//! use corsa::observers::table::{TableObserver, TableStyle};
//!
//! let harness = Harness::new(HarnessConfig::default())?;
//! let comparison = harness.compare_counts()?;
//!
//! let observer = TableObserver::new().with_style(TableStyle::Rounded);
//! println!("{}", observer.render_comparison(&comparison));
//! // ╭───────────┬──────────┬───────┬───────╮
//! // │ Name      │ ms       │ %     │ Check │
//! // ├───────────┼──────────┼───────┼───────┤
//! // │ lock-free │ 412.337  │ 9.8%  │ pass  │
//! // │ locked    │ 3790.120 │ 90.2% │ pass  │
//! // ╰───────────┴──────────┴───────┴───────╯
//! ```

use std::fmt::Display;

use tabled::{settings::Style, Table, Tabled};

use crate::context::ContextView;
use crate::frequency::KeyCountSnapshot;
use crate::harness::{Comparison, TopUpReport};

/// Available table styles for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableStyle {
    /// ASCII table with simple characters: +, -, |
    Ascii,
    /// Modern rounded corners (default)
    #[default]
    Rounded,
    /// Sharp corners with box-drawing characters
    Sharp,
    /// Modern style with clean lines
    Modern,
    /// GitHub-flavored Markdown table
    Markdown,
    /// No borders, just spacing
    Blank,
}

#[derive(Tabled)]
struct RunRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ms")]
    millis: String,
    #[tabled(rename = "%")]
    share: String,
    #[tabled(rename = "Check")]
    check: &'static str,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Count")]
    count: u64,
}

#[derive(Tabled)]
struct TopUpRow {
    #[tabled(rename = "Strategy")]
    strategy: String,
    #[tabled(rename = "Initial")]
    initial: usize,
    #[tabled(rename = "Final")]
    final_size: usize,
    #[tabled(rename = "Target")]
    target: usize,
    #[tabled(rename = "Deviation")]
    deviation: i64,
    #[tabled(rename = "ms")]
    millis: String,
}

#[derive(Tabled)]
struct ContextRow {
    #[tabled(rename = "Worker")]
    worker: String,
    #[tabled(rename = "Before")]
    before: String,
    #[tabled(rename = "After")]
    after: String,
}

fn check(passed: bool) -> &'static str {
    if passed {
        "pass"
    } else {
        "FAIL"
    }
}

fn millis(elapsed: std::time::Duration) -> String {
    format!("{:.3}", elapsed.as_secs_f64() * 1000.0)
}

fn slot<T: Display>(value: &Option<T>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "null".to_string(),
    }
}

/// Renders results as formatted tables.
#[derive(Debug, Clone, Default)]
pub struct TableObserver {
    style: TableStyle,
    title: Option<String>,
}

impl TableObserver {
    /// Creates a table observer with the rounded style and no title.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table style.
    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets a title printed above the table.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn apply_style(&self, table: &mut Table) {
        match self.style {
            TableStyle::Ascii => {
                table.with(Style::ascii());
            }
            TableStyle::Rounded => {
                table.with(Style::rounded());
            }
            TableStyle::Sharp => {
                table.with(Style::sharp());
            }
            TableStyle::Modern => {
                table.with(Style::modern());
            }
            TableStyle::Markdown => {
                table.with(Style::markdown());
            }
            TableStyle::Blank => {
                table.with(Style::blank());
            }
        }
    }

    fn finish(&self, mut table: Table) -> String {
        self.apply_style(&mut table);
        match &self.title {
            Some(title) => format!("{}\n{}", title, table),
            None => table.to_string(),
        }
    }

    /// One row per timed run: duration, share of the total, check outcome.
    pub fn render_comparison(&self, comparison: &Comparison) -> String {
        let rows: Vec<RunRow> = comparison
            .runs
            .iter()
            .map(|run| RunRow {
                name: run.name.clone(),
                millis: millis(run.elapsed),
                share: format!("{:.1}%", comparison.share(run)),
                check: check(run.passed),
            })
            .collect();
        self.finish(Table::new(&rows))
    }

    /// One row per key.
    pub fn render_snapshot(&self, snapshot: &KeyCountSnapshot) -> String {
        let rows: Vec<CountRow> = snapshot
            .iter()
            .map(|(key, count)| CountRow {
                key: key.to_string(),
                count,
            })
            .collect();
        self.finish(Table::new(&rows))
    }

    /// One row per top-up run.
    pub fn render_top_ups(&self, reports: &[TopUpReport]) -> String {
        let rows: Vec<TopUpRow> = reports
            .iter()
            .map(|report| TopUpRow {
                strategy: report.strategy.to_string(),
                initial: report.initial_size,
                final_size: report.final_size,
                target: report.target,
                deviation: report.deviation(),
                millis: millis(report.elapsed),
            })
            .collect();
        self.finish(Table::new(&rows))
    }

    /// One row per context call, `null` marking an empty slot.
    pub fn render_contexts<T: Display>(&self, views: &[ContextView<T>]) -> String {
        let rows: Vec<ContextRow> = views
            .iter()
            .map(|view| ContextRow {
                worker: view.worker.clone(),
                before: slot(&view.before),
                after: slot(&view.after),
            })
            .collect();
        self.finish(Table::new(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TopUpStrategy;
    use crate::verify::Verdict;
    use std::time::Duration;

    #[test]
    fn test_render_comparison() {
        let mut comparison = Comparison::default();
        comparison.push("lock-free", Duration::from_millis(10), true);
        comparison.push("locked", Duration::from_millis(30), false);
        let output = TableObserver::new().render_comparison(&comparison);
        assert!(output.contains("lock-free"));
        assert!(output.contains("75.0%"));
        assert!(output.contains("FAIL"));
    }

    #[test]
    fn test_render_snapshot() {
        let snapshot: KeyCountSnapshot =
            [("item0".to_string(), 12), ("item1".to_string(), 30)].into_iter().collect();
        let output = TableObserver::new()
            .with_style(TableStyle::Ascii)
            .render_snapshot(&snapshot);
        assert!(output.contains("item0"));
        assert!(output.contains("30"));
        assert!(output.contains('+'));
    }

    #[test]
    fn test_render_top_ups() {
        let report = TopUpReport {
            strategy: TopUpStrategy::Unsynchronized,
            initial_size: 900,
            final_size: 1200,
            target: 1000,
            elapsed: Duration::from_millis(3),
            verdict: Verdict::fail("cardinality 1200, expected 1000"),
        };
        let output = TableObserver::new().render_top_ups(&[report]);
        assert!(output.contains("unsynchronized"));
        assert!(output.contains("200"));
    }

    #[test]
    fn test_render_contexts() {
        let views = [ContextView {
            worker: "corsa-request-0".to_string(),
            worker_id: None,
            before: Some(4u32),
            after: Some(5u32),
        }];
        let output = TableObserver::new().render_contexts(&views);
        assert!(output.contains("corsa-request-0"));
        assert!(output.contains('4'));
    }

    #[test]
    fn test_title() {
        let output = TableObserver::new()
            .with_title("Counting")
            .render_comparison(&Comparison::default());
        assert!(output.starts_with("Counting\n"));
    }

    #[test]
    fn test_markdown_style() {
        let mut comparison = Comparison::default();
        comparison.push("only", Duration::from_millis(1), true);
        let output = TableObserver::new()
            .with_style(TableStyle::Markdown)
            .render_comparison(&comparison);
        assert!(output.contains('|'));
    }
}
