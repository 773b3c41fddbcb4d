//! A pool running tasks in dependency order.
//!
//! Tasks are added with the ids of the tasks they depend on. A task runs as
//! soon as every dependency it named has completed; dependencies that are
//! unknown or already completed when the task is added count as satisfied.
//! Completing a task releases its dependents onto the pool.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rayon::ThreadPool;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{error, trace, warn};

use crate::sync::{Deadline, build_pool, panic_message, spawn_on, wait_until};

pub type TaskId = u64;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Waiting {
    remaining: FxHashSet<TaskId>,
    job: Job,
}

#[derive(Default)]
struct PoolState {
    waiting: FxHashMap<TaskId, Waiting>,
    dependents: FxHashMap<TaskId, Vec<TaskId>>,
    known: FxHashSet<TaskId>,
    completed: FxHashSet<TaskId>,
    running: usize,
    panicked: usize,
}

impl PoolState {
    fn is_drained(&self) -> bool {
        self.running == 0 && self.waiting.is_empty()
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<PoolState>,
    drained: Condvar,
}

pub struct TaskPool {
    pool: Option<ThreadPool>,
    shared: Arc<Shared>,
}

impl TaskPool {
    pub fn new(threads: usize) -> Self {
        Self {
            pool: build_pool("weft-index", threads),
            shared: Arc::default(),
        }
    }

    /// Add a task that runs once every task in `dependencies` completed.
    /// Returns `false` if `id` was already added.
    pub fn add_task(
        &self,
        id: TaskId,
        dependencies: impl IntoIterator<Item = TaskId>,
        task: impl FnOnce() + Send + 'static,
    ) -> bool {
        let mut state = self.shared.state.lock();
        if !state.known.insert(id) {
            warn!(task = id, "task added twice, ignoring");
            return false;
        }
        let remaining: FxHashSet<TaskId> = dependencies
            .into_iter()
            .filter(|dep| *dep != id && state.known.contains(dep) && !state.completed.contains(dep))
            .collect();
        if remaining.is_empty() {
            state.running += 1;
            drop(state);
            self.start(id, Box::new(task));
            return true;
        }
        for dep in &remaining {
            state.dependents.entry(*dep).or_default().push(id);
        }
        trace!(task = id, waiting_on = remaining.len(), "task queued");
        state.waiting.insert(
            id,
            Waiting {
                remaining,
                job: Box::new(task),
            },
        );
        true
    }

    /// Block until every added task has run.
    pub fn wait_until_all_complete(&self) {
        self.wait_until_all_complete_until(Deadline::infinite());
    }

    /// Like [`wait_until_all_complete`](Self::wait_until_all_complete), giving
    /// up at `deadline`. Returns whether the pool drained.
    pub fn wait_until_all_complete_until(&self, deadline: Deadline) -> bool {
        let mut state = self.shared.state.lock();
        wait_until(&mut state, &self.shared.drained, deadline, PoolState::is_drained)
    }

    /// Number of tasks that panicked so far.
    pub fn panicked(&self) -> usize {
        self.shared.state.lock().panicked
    }

    pub fn is_completed(&self, id: TaskId) -> bool {
        self.shared.state.lock().completed.contains(&id)
    }

    fn start(&self, id: TaskId, job: Job) {
        let shared = Arc::clone(&self.shared);
        spawn_on(self.pool.as_ref(), move || execute(shared, id, job));
    }
}

/// Run one task, then release its dependents onto the current pool.
fn execute(shared: Arc<Shared>, id: TaskId, job: Job) {
    let outcome = catch_unwind(AssertUnwindSafe(job));

    let ready = {
        let mut state = shared.state.lock();
        if let Err(payload) = &outcome {
            state.panicked += 1;
            error!(task = id, panic = panic_message(payload.as_ref()), "task panicked");
        }
        state.completed.insert(id);
        state.running -= 1;

        let mut ready = Vec::new();
        for dependent in state.dependents.remove(&id).unwrap_or_default() {
            let unblocked = state.waiting.get_mut(&dependent).is_some_and(|w| {
                w.remaining.remove(&id);
                w.remaining.is_empty()
            });
            if unblocked && let Some(waiting) = state.waiting.remove(&dependent) {
                ready.push((dependent, waiting.job));
            }
        }
        state.running += ready.len();
        if state.is_drained() {
            shared.drained.notify_all();
        }
        ready
    };

    for (dependent, job) in ready {
        let shared = Arc::clone(&shared);
        // Inside a pool worker this lands on the same pool.
        rayon::spawn(move || execute(shared, dependent, job));
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TaskPool")
            .field("running", &state.running)
            .field("waiting", &state.waiting.len())
            .field("completed", &state.completed.len())
            .finish()
    }
}
