//! Observers for rendering run reports.
//!
//! - [`table`] - Pretty-print comparisons, snapshots and reports as tables using `tabled`
//! - [`json`] - Serialize any report to JSON
//!
//! # Feature Flags
//!
//! Each observer is gated behind a feature flag to minimize dependencies:
//!
//! - `table` - Enables the [`table`] module
//! - `json` - Enables the [`json`] module
//! - `full` - Enables all observer modules
//!
//! JSON errors surface as [`Error::Json`](crate::Error), so switching
//! observers does not change error handling.

#[cfg(feature = "table")]
pub mod table;

#[cfg(feature = "json")]
pub mod json;
