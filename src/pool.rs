//! Fixed-size worker pool with a quiescence barrier.
//!
//! [`WorkerPool`] owns `N` named OS threads draining one shared queue. Tasks
//! in a batch run in parallel and in no particular order. The caller learns
//! that a batch is done through [`WorkerPool::await_quiescence`], which
//! blocks until every submitted task has finished or the timeout expires.
//!
//! ```text
//!   submit(batch) ──► [ queue ] ──► corsa-worker-0 ─┐
//!                                ├─► corsa-worker-1 ─┤ finish ──► pending -= 1
//!                                └─► corsa-worker-N ─┘              │
//!   await_quiescence(timeout) ◄──── condvar ◄── pending == 0 ───────┘
//! ```
//!
//! Workers are long-lived and reused across submissions, which is exactly
//! what lets state parked in a worker-local slot survive from one task to
//! the next (see [`crate::context`]). [`WorkerId::current`] tells a task
//! which worker it landed on.
//!
//! A panicking task is caught on the worker, counted as a fault and
//! otherwise ignored: siblings keep running and the worker keeps serving.

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{trace, warn};

use crate::error::{Error, Result};

/// A unit of work: a zero-argument closure run at most once by one worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Default number of worker threads.
pub const DEFAULT_WORKERS: usize = 10;

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CURRENT_WORKER: Cell<Option<WorkerId>> = const { Cell::new(None) };
}

/// Identity of a pool worker: which pool, and which thread within it.
///
/// Set once when the worker starts, so every task the worker runs sees the
/// same id. Threads that do not belong to a pool have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WorkerId {
    pool: usize,
    index: usize,
}

impl WorkerId {
    /// The id of the worker executing the caller, `None` off-pool.
    pub fn current() -> Option<WorkerId> {
        CURRENT_WORKER.with(Cell::get)
    }

    /// Process-unique id of the owning pool.
    pub fn pool(&self) -> usize {
        self.pool
    }

    /// Position of the worker within its pool, `0..workers`.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool-{}/worker-{}", self.pool, self.index)
    }
}

/// Pool sizing and thread naming.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Worker threads are named `{prefix}-{index}`.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            thread_name_prefix: "corsa-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Sets the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

/// Counters describing the pool's lifetime activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Number of worker threads.
    pub workers: usize,
    /// Tasks accepted by `submit`.
    pub submitted: usize,
    /// Tasks that finished, normally or by panicking.
    pub completed: usize,
    /// Tasks that panicked.
    pub faults: usize,
}

/// State shared between the pool handle and its workers.
struct Shared {
    /// Tasks submitted but not yet finished.
    pending: Mutex<usize>,
    idle: Condvar,
    submitted: AtomicUsize,
    completed: AtomicUsize,
    faults: AtomicUsize,
}

impl Shared {
    fn finish_one(&self) {
        let mut pending = self.pending.lock();
        *pending -= 1;
        self.completed.fetch_add(1, Ordering::Relaxed);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// A bounded pool of reusable worker threads.
///
/// # Examples
///
/// ```rust
/// use corsa::pool::{PoolConfig, WorkerPool};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let pool = WorkerPool::new(PoolConfig::default().with_workers(4)).unwrap();
/// let hits = Arc::new(AtomicUsize::new(0));
///
/// pool.submit((0..100).map(|_| {
///     let hits = Arc::clone(&hits);
///     move || {
///         hits.fetch_add(1, Ordering::Relaxed);
///     }
/// }))
/// .unwrap();
///
/// pool.shutdown();
/// assert!(pool.await_quiescence(Duration::from_secs(10)));
/// assert_eq!(hits.load(Ordering::Relaxed), 100);
/// ```
pub struct WorkerPool {
    /// `None` once the pool has been shut down.
    sender: RwLock<Option<Sender<Task>>>,
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    workers: usize,
}

impl WorkerPool {
    /// Spawns the configured number of workers.
    ///
    /// Fails with [`Error::InvalidConfig`] for a zero-sized pool and with
    /// [`Error::WorkerSpawn`] if the OS refuses a thread. Workers spawned
    /// before a spawn failure are shut down and joined.
    pub fn new(config: PoolConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(Error::InvalidConfig(
                "a worker pool needs at least one worker".to_string(),
            ));
        }

        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();
        let shared = Arc::new(Shared {
            pending: Mutex::new(0),
            idle: Condvar::new(),
            submitted: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            faults: AtomicUsize::new(0),
        });

        let pool_id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let pool = Self {
            sender: RwLock::new(Some(sender)),
            shared,
            handles: Mutex::new(Vec::with_capacity(config.workers)),
            workers: config.workers,
        };

        for index in 0..config.workers {
            let name = format!("{}-{}", config.thread_name_prefix, index);
            let receiver = receiver.clone();
            let shared = Arc::clone(&pool.shared);
            let id = WorkerId {
                pool: pool_id,
                index,
            };
            let handle = thread::Builder::new()
                .name(name)
                .spawn(move || run_worker(id, receiver, shared))?;
            pool.handles.lock().push(handle);
        }

        Ok(pool)
    }

    /// Spawns a pool of `workers` threads with default naming.
    pub fn with_workers(workers: usize) -> Result<Self> {
        Self::new(PoolConfig::default().with_workers(workers))
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Enqueues a batch of tasks for parallel, unordered execution.
    ///
    /// Returns the number of tasks accepted, or [`Error::PoolClosed`] after
    /// [`shutdown`](Self::shutdown).
    pub fn submit<I, F>(&self, tasks: I) -> Result<usize>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() + Send + 'static,
    {
        let batch: Vec<Task> = tasks
            .into_iter()
            .map(|task| Box::new(task) as Task)
            .collect();

        let sender = self.sender.read();
        let Some(sender) = sender.as_ref() else {
            return Err(Error::PoolClosed);
        };

        let count = batch.len();
        // Account for the whole batch before any of it can finish.
        *self.shared.pending.lock() += count;
        self.shared.submitted.fetch_add(count, Ordering::Relaxed);

        for (sent, task) in batch.into_iter().enumerate() {
            if sender.send(task).is_err() {
                let unsent = count - sent;
                let mut pending = self.shared.pending.lock();
                *pending -= unsent;
                self.shared.submitted.fetch_sub(unsent, Ordering::Relaxed);
                if *pending == 0 {
                    self.shared.idle.notify_all();
                }
                return Err(Error::PoolClosed);
            }
        }
        Ok(count)
    }

    /// Enqueues a single task.
    pub fn spawn<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(std::iter::once(task)).map(|_| ())
    }

    /// Runs `f` on one of the workers and blocks until it returns.
    ///
    /// If `f` panics the fault is counted like any other and the caller gets
    /// [`Error::Disconnected`].
    pub fn execute<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, response) = crossbeam_channel::bounded(1);
        self.spawn(move || {
            // The caller only goes away if it was itself torn down.
            let _ = reply.send(f());
        })?;
        response.recv().map_err(|_| Error::Disconnected)
    }

    /// Blocks until every submitted task has completed or `timeout` elapses.
    ///
    /// Returns `true` when the pool went idle, `false` on timeout. A timeout
    /// does not cancel anything: outstanding tasks keep running. Everything
    /// those tasks wrote before finishing is visible to the caller once this
    /// returns `true`.
    pub fn await_quiescence(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            match deadline {
                Some(deadline) => {
                    if self.shared.idle.wait_until(&mut pending, deadline).timed_out() {
                        return *pending == 0;
                    }
                }
                None => self.shared.idle.wait(&mut pending),
            }
        }
        true
    }

    /// Tasks submitted but not yet finished.
    pub fn pending(&self) -> usize {
        *self.shared.pending.lock()
    }

    /// Lifetime counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.workers,
            submitted: self.shared.submitted.load(Ordering::Relaxed),
            completed: self.shared.completed.load(Ordering::Relaxed),
            faults: self.shared.faults.load(Ordering::Relaxed),
        }
    }

    /// Stops accepting submissions. Already queued tasks still run; workers
    /// exit once the queue is drained.
    pub fn shutdown(&self) {
        if self.sender.write().take().is_some() {
            trace!(workers = self.workers, "pool shut down");
        }
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
        for handle in self.handles.get_mut().drain(..) {
            // Tasks run under catch_unwind, so a worker never unwinds itself.
            let _ = handle.join();
        }
    }
}

fn run_worker(id: WorkerId, receiver: Receiver<Task>, shared: Arc<Shared>) {
    CURRENT_WORKER.with(|current| current.set(Some(id)));
    let current = thread::current();
    let name = current.name().unwrap_or("worker");
    trace!(worker = name, "worker started");

    for task in receiver.iter() {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            shared.faults.fetch_add(1, Ordering::Relaxed);
            warn!(worker = name, "task panicked; fault isolated");
        }
        shared.finish_one();
    }

    trace!(worker = name, "worker stopped");
}
