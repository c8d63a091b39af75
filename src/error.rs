//! Error taxonomy for the harness and its worker pool.
//!
//! Only system faults are errors. A strategy producing a wrong answer is an
//! expected outcome and is reported through [`crate::verify::Verdict`]
//! instead. Nothing in the crate retries on any of these.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the pool, the context runs and the harness.
#[derive(Debug, Error)]
pub enum Error {
    /// Tasks were submitted after the pool was shut down.
    #[error("pool closed: no further submissions are accepted")]
    PoolClosed,

    /// The quiescence barrier expired with tasks still pending or in flight.
    #[error("quiescence timeout after {waited:?} with {pending} task(s) outstanding")]
    QuiescenceTimeout {
        /// How long the caller waited.
        waited: Duration,
        /// Tasks not yet completed when the wait gave up.
        pending: usize,
    },

    /// One or more tasks panicked. Sibling tasks still ran to completion.
    #[error("{faults} task(s) faulted")]
    TaskFault {
        /// Number of tasks that panicked.
        faults: usize,
    },

    /// A single-task call lost its reply because the task panicked.
    #[error("task dropped its reply channel")]
    Disconnected,

    /// The operating system refused to spawn a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error from the JSON observer.
    #[cfg(feature = "json")]
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
