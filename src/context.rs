//! Worker-local context slots and the leak they cause on pooled threads.
//!
//! A [`WorkerLocalContext`] keeps one value per executing thread. That is
//! the right lifetime for a worker, and the wrong one for a logical
//! operation: when a pool hands an unrelated operation to a recycled worker,
//! whatever the previous operation left in the slot is still there.
//!
//! ```text
//!   call(1) on worker-3:  before = null   write 1   after = 1
//!   call(2) on worker-5:  before = null   write 2   after = 2
//!   call(3) on worker-3:  before = 1  ◄── left behind by call(1)
//! ```
//!
//! [`WorkerLocalContext::leaking`] reproduces that. [`WorkerLocalContext::scoped`]
//! runs the same sequence inside a [`ContextScope`], which clears the slot
//! when it is dropped, on normal return and on unwind alike.

use std::fmt;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use dashmap::DashMap;

use crate::pool::WorkerId;

/// What one logical operation saw in its worker's slot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ContextView<T> {
    /// Name of the thread that ran the operation.
    pub worker: String,
    /// Pool identity of that thread; `None` when it is not a pool worker.
    pub worker_id: Option<WorkerId>,
    /// Slot content before the operation wrote; `None` is the empty marker.
    pub before: Option<T>,
    /// Slot content right after the write.
    pub after: Option<T>,
}

impl<T> ContextView<T> {
    /// Whether the operation started from a slot another operation had
    /// written.
    pub fn is_stale(&self) -> bool {
        self.before.is_some()
    }
}

struct Slot<'a, T>(&'a str, &'a Option<T>);

impl<T: fmt::Display> fmt::Display for Slot<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.1 {
            Some(value) => write!(f, "{}:{}", self.0, value),
            None => write!(f, "{}:null", self.0),
        }
    }
}

impl<T: fmt::Display> fmt::Display for ContextView<T> {
    /// Formats as `before=worker:value after=worker:value`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "before={} after={}",
            Slot(&self.worker, &self.before),
            Slot(&self.worker, &self.after)
        )
    }
}

/// One mutable slot per executing thread, keyed by the thread's identity.
///
/// # Examples
///
/// ```rust
/// use corsa::context::WorkerLocalContext;
///
/// let context = WorkerLocalContext::new();
/// let first = context.leaking(7);
/// assert_eq!(first.before, None);
///
/// // Same thread, unrelated call: it sees the previous call's value.
/// let second = context.leaking(8);
/// assert_eq!(second.before, Some(7));
///
/// context.clear();
/// assert_eq!(context.scoped(9).before, None);
/// assert_eq!(context.scoped(10).before, None);
/// ```
pub struct WorkerLocalContext<T> {
    slots: DashMap<ThreadId, T>,
}

impl<T: Clone> WorkerLocalContext<T> {
    /// Creates a context with every slot empty.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    fn current(&self) -> Option<T> {
        self.slots
            .get(&thread::current().id())
            .map(|slot| slot.value().clone())
    }

    /// The calling worker's slot before the operation writes to it.
    pub fn read_before(&self) -> Option<T> {
        self.current()
    }

    /// Sets the calling worker's slot.
    pub fn write_current(&self, value: T) {
        self.slots.insert(thread::current().id(), value);
    }

    /// The calling worker's slot after the write.
    pub fn read_after(&self) -> Option<T> {
        self.current()
    }

    /// Empties the calling worker's slot, returning what it held.
    pub fn clear(&self) -> Option<T> {
        self.slots
            .remove(&thread::current().id())
            .map(|(_, value)| value)
    }

    /// Returns a guard that empties the calling worker's slot when dropped.
    pub fn scope(&self) -> ContextScope<'_, T> {
        ContextScope {
            context: self,
            _not_send: PhantomData,
        }
    }

    /// Number of workers whose slot currently holds a value.
    pub fn occupied(&self) -> usize {
        self.slots.len()
    }

    /// Read, write, read, and leave the value behind.
    pub fn leaking(&self, value: T) -> ContextView<T> {
        let before = self.read_before();
        self.write_current(value);
        let after = self.read_after();
        ContextView {
            worker: worker_name(),
            worker_id: WorkerId::current(),
            before,
            after,
        }
    }

    /// Same sequence as [`leaking`](Self::leaking), with the slot emptied on
    /// every exit path.
    pub fn scoped(&self, value: T) -> ContextView<T> {
        let _scope = self.scope();
        self.leaking(value)
    }
}

impl<T: Clone> Default for WorkerLocalContext<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for WorkerLocalContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerLocalContext")
            .field("occupied", &self.slots.len())
            .finish()
    }
}

/// Clears the owning thread's slot on drop.
///
/// Not `Send`: it must be dropped on the thread whose slot it guards.
pub struct ContextScope<'a, T: Clone> {
    context: &'a WorkerLocalContext<T>,
    _not_send: PhantomData<*const ()>,
}

impl<T: Clone> Drop for ContextScope<'_, T> {
    fn drop(&mut self) {
        self.context.clear();
    }
}

impl<T: Clone> fmt::Debug for ContextScope<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScope").finish_non_exhaustive()
    }
}

fn worker_name() -> String {
    let current = thread::current();
    match current.name() {
        Some(name) => name.to_owned(),
        None => format!("{:?}", current.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;

    #[test]
    fn test_read_write() {
        let context = WorkerLocalContext::new();
        assert_eq!(context.read_before(), None);
        context.write_current(3);
        assert_eq!(context.read_after(), Some(3));
        assert_eq!(context.clear(), Some(3));
        assert_eq!(context.read_before(), None);
    }

    #[test]
    fn test_slots_are_per_thread() {
        let context = Arc::new(WorkerLocalContext::new());
        context.write_current(1);

        let other = Arc::clone(&context);
        let seen = thread::spawn(move || other.read_before()).join().unwrap();
        assert_eq!(seen, None);
        assert_eq!(context.read_before(), Some(1));
    }

    #[test]
    fn test_leaking_keeps_value() {
        let context = WorkerLocalContext::new();
        let first = context.leaking(1);
        assert!(!first.is_stale());
        assert_eq!(first.after, Some(1));

        let second = context.leaking(2);
        assert!(second.is_stale());
        assert_eq!(second.before, Some(1));
        assert_eq!(context.occupied(), 1);
    }

    #[test]
    fn test_scoped_clears_value() {
        let context = WorkerLocalContext::new();
        for value in 0..5 {
            let view = context.scoped(value);
            assert_eq!(view.before, None);
            assert_eq!(view.after, Some(value));
        }
        assert_eq!(context.occupied(), 0);
    }

    #[test]
    fn test_scope_clears_on_unwind() {
        let context = WorkerLocalContext::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _scope = context.scope();
            context.write_current(42);
            panic!("operation failed");
        }));
        assert!(result.is_err());
        assert_eq!(context.read_before(), None);
    }

    #[test]
    fn test_view_carries_worker_id() {
        assert_eq!(WorkerLocalContext::new().leaking(1u32).worker_id, None);

        let pool = crate::pool::WorkerPool::with_workers(2).unwrap();
        let context = Arc::new(WorkerLocalContext::new());
        let mut last = std::collections::HashMap::new();
        for value in 0..8u32 {
            let context = Arc::clone(&context);
            let view = pool.execute(move || context.leaking(value)).unwrap();
            let id = view.worker_id.unwrap();
            assert!(id.index() < 2);
            // A stale slot always holds what this same worker wrote last.
            assert_eq!(view.before, last.insert(id, value));
        }
    }

    #[test]
    fn test_display() {
        let view = ContextView {
            worker: "corsa-request-1".to_string(),
            worker_id: None,
            before: None,
            after: Some(5),
        };
        assert_eq!(
            view.to_string(),
            "before=corsa-request-1:null after=corsa-request-1:5"
        );
    }
}
