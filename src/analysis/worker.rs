//! The per-file analysis worker.
//!
//! Each open file gets one thread that owns its compile loop. Requests are
//! numbered by generation: every scheduled update takes the next generation
//! and a read records the generation it needs before it may run. The worker
//! serves ready reads first, then compiles the newest queued update, so a
//! burst of edits collapses into a single compile of the last one.

use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace, warn};

use super::result::{AnalysisResult, FileInputs};
use super::{AnalysisCallbacks, FileAnalyzer, ReadError};
use crate::base::Position;
use crate::sync::{Deadline, Semaphore, panic_message, wait_until};

pub(crate) type ReadAction = Box<dyn FnOnce(Result<Arc<AnalysisResult>, ReadError>) + Send>;

/// A request to recompile the file.
pub(crate) struct Update {
    pub inputs: FileInputs,
    pub want_diagnostics: bool,
    /// Lines of the previous text this update may change; `None` for all.
    pub touched: Option<RangeInclusive<usize>>,
}

impl Update {
    fn touches(&self, line: usize) -> bool {
        self.touched.as_ref().is_none_or(|lines| lines.contains(&line))
    }

    /// Fold a superseded update into its replacement.
    fn absorb(&mut self, older: Update) {
        self.want_diagnostics |= older.want_diagnostics;
        self.touched = match (older.touched, self.touched.take()) {
            (Some(a), Some(b)) => Some(*a.start().min(b.start())..=*a.end().max(b.end())),
            _ => None,
        };
    }
}

struct Read {
    min_generation: u64,
    action: ReadAction,
}

#[derive(Default)]
struct State {
    pending: Option<(u64, Update)>,
    reads: VecDeque<Read>,
    current: Option<Arc<AnalysisResult>>,
    /// Generation of the newest scheduled update.
    issued: u64,
    /// Generation of the newest update taken up for compiling.
    started: u64,
    /// Generation `current` was built from.
    completed: u64,
    compiling: bool,
    stopping: bool,
}

impl State {
    fn is_idle(&self) -> bool {
        self.pending.is_none() && !self.compiling
    }

    fn take_ready_reads(&mut self) -> Vec<Read> {
        let completed = self.completed;
        let (ready, waiting): (Vec<Read>, Vec<Read>) = std::mem::take(&mut self.reads)
            .into_iter()
            .partition(|r| r.min_generation <= completed);
        self.reads = waiting.into();
        ready
    }
}

struct Shared {
    file: PathBuf,
    state: Mutex<State>,
    changed: Condvar,
}

pub(crate) struct Worker {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn spawn(
        file: PathBuf,
        analyzer: Arc<dyn FileAnalyzer>,
        callbacks: Arc<dyn AnalysisCallbacks>,
        semaphore: Arc<Semaphore>,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            file,
            state: Mutex::new(State::default()),
            changed: Condvar::new(),
        });
        let thread = std::thread::Builder::new()
            .name("weft-analysis".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run(&shared, analyzer.as_ref(), callbacks.as_ref(), &semaphore)
            })?;
        debug!(file = %shared.file.display(), "started analysis worker");
        Ok(Self {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Queue `update`, replacing any update that has not started yet.
    /// Returns `false` once the worker is shutting down.
    pub fn schedule(&self, mut update: Update) -> bool {
        let mut state = self.shared.state.lock();
        if state.stopping {
            return false;
        }
        state.issued += 1;
        let generation = state.issued;
        if let Some((superseded, older)) = state.pending.take() {
            trace!(
                file = %self.shared.file.display(),
                superseded,
                generation,
                "coalesced queued update"
            );
            update.absorb(older);
        }
        state.pending = Some((generation, update));
        self.shared.changed.notify_all();
        true
    }

    /// Queue `action` to run on the worker thread with a result at least as
    /// fresh as the newest update scheduled so far.
    ///
    /// With a `position`, an update that has not started and does not touch
    /// the position's line is not waited for.
    pub fn read(&self, position: Option<Position>, action: ReadAction) {
        let mut state = self.shared.state.lock();
        if state.stopping {
            drop(state);
            action(Err(ReadError::Cancelled));
            return;
        }
        let min_generation = match (position, &state.pending) {
            (Some(position), Some((_, update))) if !update.touches(position.line) => state.started,
            _ => state.issued,
        };
        state.reads.push_back(Read {
            min_generation,
            action,
        });
        self.shared.changed.notify_all();
    }

    /// Block until nothing is queued or compiling, or `deadline` passes.
    pub fn wait_idle(&self, deadline: Deadline) -> bool {
        let mut state = self.shared.state.lock();
        wait_until(&mut state, &self.shared.changed, deadline, State::is_idle)
    }

    /// Stop accepting requests, let a running compile finish and join the
    /// thread. Reads still waiting are cancelled.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.stopping = true;
            self.shared.changed.notify_all();
        }
        let handle = self.thread.lock().take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!(file = %self.shared.file.display(), "analysis worker thread panicked");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    shared: &Shared,
    analyzer: &dyn FileAnalyzer,
    callbacks: &dyn AnalysisCallbacks,
    semaphore: &Semaphore,
) {
    let file = shared.file.as_path();
    loop {
        let (generation, update) = {
            let mut state = shared.state.lock();
            loop {
                let ready = state.take_ready_reads();
                if !ready.is_empty() {
                    let current = state.current.clone();
                    drop(state);
                    serve(file, ready, current);
                    state = shared.state.lock();
                    continue;
                }
                if state.stopping {
                    let cancelled = std::mem::take(&mut state.reads);
                    if state.pending.take().is_some() {
                        trace!(file = %file.display(), "dropped queued update at shutdown");
                    }
                    drop(state);
                    for read in cancelled {
                        (read.action)(Err(ReadError::Cancelled));
                    }
                    debug!(file = %file.display(), "analysis worker stopped");
                    return;
                }
                if let Some((generation, update)) = state.pending.take() {
                    state.started = generation;
                    state.compiling = true;
                    break (generation, update);
                }
                shared.changed.wait(&mut state);
            }
        };

        let result = compile(file, analyzer, semaphore, &update.inputs);
        if update.want_diagnostics {
            let published = catch_unwind(AssertUnwindSafe(|| {
                callbacks.on_diagnostics(file, result.version, &result.diagnostics)
            }));
            if let Err(payload) = published {
                error!(
                    file = %file.display(),
                    panic = panic_message(payload.as_ref()),
                    "diagnostics callback panicked"
                );
            }
        }

        let previous = {
            let mut state = shared.state.lock();
            let previous = state.current.replace(result);
            state.completed = generation;
            state.compiling = false;
            shared.changed.notify_all();
            previous
        };
        // Released outside the state lock; readers may still hold it.
        drop(previous);
    }
}

/// Run the analyzer under a semaphore slot, turning failures into a
/// degraded result.
fn compile(
    file: &Path,
    analyzer: &dyn FileAnalyzer,
    semaphore: &Semaphore,
    inputs: &FileInputs,
) -> Arc<AnalysisResult> {
    let _slot = semaphore.acquire();
    trace!(file = %file.display(), version = inputs.version, "analyzing");
    let result = match catch_unwind(AssertUnwindSafe(|| analyzer.analyze(inputs))) {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            warn!(file = %file.display(), version = inputs.version, %err, "analysis failed");
            AnalysisResult::degraded(inputs, &err)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(file = %file.display(), version = inputs.version, panic = message, "analysis panicked");
            AnalysisResult::degraded(inputs, format_args!("compiler panicked: {message}"))
        }
    };
    Arc::new(result)
}

fn serve(file: &Path, reads: Vec<Read>, current: Option<Arc<AnalysisResult>>) {
    for read in reads {
        let outcome = current.clone().ok_or(ReadError::NotAnalyzed);
        if catch_unwind(AssertUnwindSafe(|| (read.action)(outcome))).is_err() {
            error!(file = %file.display(), "read callback panicked");
        }
    }
}
