//! Off-thread destruction of evicted values.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rayon::ThreadPool;
use tracing::trace;

use crate::sync::{Deadline, build_pool, spawn_on, wait_until};

/// Drops values on a small background pool so the caller never pays for
/// tearing down a large compiler instance.
pub struct Reaper {
    pool: Option<ThreadPool>,
    pending: Arc<Pending>,
}

#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

/// Decrements the pending count even if the value's destructor panics.
struct Finished(Arc<Pending>);

impl Drop for Finished {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.drained.notify_all();
        }
    }
}

impl Reaper {
    pub fn new(threads: usize) -> Self {
        Self {
            pool: build_pool("weft-reaper", threads),
            pending: Arc::default(),
        }
    }

    /// Hand `value` over for destruction. Returns immediately.
    pub fn dispose<T: Send + 'static>(&self, value: T) {
        *self.pending.count.lock() += 1;
        let finished = Finished(Arc::clone(&self.pending));
        spawn_on(self.pool.as_ref(), move || {
            let _finished = finished;
            drop(value);
            trace!("reaped value");
        });
    }

    /// Number of values handed over but not yet dropped.
    pub fn pending(&self) -> usize {
        *self.pending.count.lock()
    }

    /// Block until every disposed value has been dropped or `deadline` passes.
    pub fn wait_idle(&self, deadline: Deadline) -> bool {
        let mut count = self.pending.count.lock();
        wait_until(&mut count, &self.pending.drained, deadline, |count| *count == 0)
    }
}

impl std::fmt::Debug for Reaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaper")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
