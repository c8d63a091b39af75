//! # Corsa - Making Concurrency Hazards Observable
//!
//! A small harness that populates shared mutable structures from many
//! concurrent workers, under deliberately different synchronization
//! disciplines, and checks whether the result is correct. Races that are
//! normally invisible become numbers you can assert on.
//!
//! ## The Hazards
//!
//! | Hazard | Broken variant | Fixed variant |
//! |--------|----------------|---------------|
//! | Check-then-act on a concurrent map | [`TopUpStrategy::Unsynchronized`](store::TopUpStrategy::Unsynchronized) | [`CoarseLock`](store::TopUpStrategy::CoarseLock), [`Reserving`](store::TopUpStrategy::Reserving) |
//! | One lock for every increment | [`CountStrategy::Locked`](frequency::CountStrategy::Locked) (correct, slow) | [`CountStrategy::LockFree`](frequency::CountStrategy::LockFree) |
//! | Worker-scoped state used as request state | [`WorkerLocalContext::leaking`](context::WorkerLocalContext::leaking) | [`WorkerLocalContext::scoped`](context::WorkerLocalContext::scoped) |
//!
//! ## Components
//!
//! - [`pool`]: fixed-size pool of reusable OS threads with a quiescence barrier
//! - [`store`]: string-to-integer store with three top-up strategies
//! - [`frequency`]: multiset counter with a locked and a lock-free strategy
//! - [`counters`]: the sharded additive accumulator behind the lock-free counter
//! - [`context`]: per-worker slots, leaking and scoped
//! - [`verify`]: pure post-run checks returning [`Verdict`](verify::Verdict)s
//! - [`harness`]: seed, dispatch, wait, verify, time
//!
//! ## Quick Start
//!
//! ```rust
//! use corsa::harness::{Harness, HarnessConfig};
//!
//! let harness = Harness::new(HarnessConfig::default().with_loop_count(50_000)).unwrap();
//!
//! // Always exactly on target.
//! assert_eq!(harness.run_locked_top_up().unwrap().final_size, 1000);
//!
//! // Sometimes not.
//! let flawed = harness.run_flawed_top_up().unwrap();
//! println!("flawed top-up ended at {}", flawed.final_size);
//!
//! // Both counters are correct; compare how long they took.
//! let comparison = harness.compare_counts().unwrap();
//! assert!(comparison.all_passed());
//! println!("{comparison}");
//! ```
//!
//! ## Errors
//!
//! Only system faults are errors ([`Error`]): submitting to a closed pool, a
//! quiescence barrier that expired, tasks that panicked. A strategy producing
//! the wrong answer is an expected outcome and shows up as a failed
//! [`Verdict`](verify::Verdict) instead.
//!
//! ## Logging
//!
//! Runs emit [`tracing`] events (`info` for run boundaries, `debug` per
//! top-up task, `warn` for failed checks, timeouts and faults). No subscriber
//! is installed by the library.
//!
//! ## Observers
//!
//! Optional observer modules render reports, each behind a feature flag:
//!
//! | Feature | Module | Description |
//! |---------|--------|-------------|
//! | `table` | `observers::table` | Comparisons and snapshots as ASCII tables |
//! | `json` | `observers::json` | Any report as JSON |
//! | `full` | All observers | Enables all observer modules |

pub mod context;
pub mod counters;
pub mod error;
pub mod frequency;
pub mod harness;
pub mod observers;
pub mod pool;
pub mod store;
pub mod verify;

pub use error::{Error, Result};
