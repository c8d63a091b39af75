//! Sharded additive accumulators and the per-thread slot machinery behind them.
//!
//! The lock-free counting strategy needs one accumulator per key that many
//! workers can bump at once without meeting on a single cache line. This
//! module provides that accumulator, [`Adder`], built on a fixed array of
//! cache-padded atomic shards.
//!
//! # Architecture
//!
//! 1. A global atomic counter (`NEXT_SLOT_ID`) assigns sequential IDs to threads
//! 2. Each thread stores its assigned slot index in thread-local storage
//! 3. The slot index is used modulo `NUM_COMPONENTS` (64) to select which
//!    shard a thread writes to
//! 4. Each shard is cache-line padded to prevent false sharing
//!
//! ```text
//!                          ┌─────────────────────────────────────┐
//!                          │             Adder                   │
//!                          ├─────────────────────────────────────┤
//!   worker-0 ──adds───►    │ [Slot 0] ████████ (CachePadded)     │
//!   worker-1 ──adds───►    │ [Slot 1] ████████ (CachePadded)     │
//!   worker-2 ──adds───►    │ [Slot 2] ████████ (CachePadded)     │
//!        ...               │    ...                              │
//!   worker-63 ─adds───►    │ [Slot 63] ███████ (CachePadded)     │
//!                          └─────────────────────────────────────┘
//!                                          │
//!                                          ▼
//!                                   sum() aggregates
//!                                   all slots on read
//! ```
//!
//! # Thread Slot Assignment
//!
//! Slots are assigned round-robin: the first thread gets slot 0, the second
//! gets slot 1, and so on. After 64 threads, assignment wraps around. A pool
//! of ten workers therefore never shares a slot, and a worker touching a
//! key's accumulator only contends with itself.
//!
//! # Reading
//!
//! [`Adder::sum`] walks every shard with relaxed loads. It is a point-in-time
//! view that is only exact once writers have stopped, which is what the
//! quiescence barrier of [`crate::pool::WorkerPool`] provides.

pub mod adder;

pub use adder::Adder;

use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of shards (slots) used by each accumulator.
///
/// Each slot is cache-line padded (64 bytes), so total memory per accumulator is:
/// `64 slots × 64 bytes = 4,096 bytes (4KB)`
pub(crate) const NUM_COMPONENTS: usize = 64;

/// Global counter for assigning slot IDs to threads.
static NEXT_SLOT_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    /// Slot index of the current thread, assigned on first use and stable for
    /// the lifetime of the thread.
    pub(crate) static THREAD_SLOT_INDEX: usize = next_slot_id();
}

/// Assigns the next slot ID, in the range `[0, NUM_COMPONENTS)`.
///
/// Relaxed ordering is enough: two threads landing on the same slot only
/// costs contention, never correctness.
fn next_slot_id() -> usize {
    NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed) % NUM_COMPONENTS
}
