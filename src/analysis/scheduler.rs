//! Routing editor notifications and feature requests to per-file workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use super::result::{AnalysisResult, FileInputs};
use super::worker::{ReadAction, Update, Worker};
use super::{AnalysisCallbacks, FileAnalyzer, ReadError};
use crate::base::Position;
use crate::config::Options;
use crate::document::{DocumentStore, EditError, TextEdit, invalidated_lines};
use crate::sync::{Deadline, Semaphore, wait_until};

/// Owns the document store and one analysis worker per open file.
pub struct AnalysisScheduler {
    documents: Arc<DocumentStore>,
    analyzer: Arc<dyn FileAnalyzer>,
    callbacks: Arc<dyn AnalysisCallbacks>,
    semaphore: Arc<Semaphore>,
    workers: Mutex<FxHashMap<PathBuf, Arc<Worker>>>,
}

impl AnalysisScheduler {
    pub fn new(
        options: &Options,
        documents: Arc<DocumentStore>,
        analyzer: Arc<dyn FileAnalyzer>,
        callbacks: Arc<dyn AnalysisCallbacks>,
    ) -> Self {
        Self {
            documents,
            analyzer,
            callbacks,
            semaphore: Arc::new(Semaphore::new(options.max_concurrent_analyses.max(1))),
            workers: Mutex::default(),
        }
    }

    pub fn documents(&self) -> &Arc<DocumentStore> {
        &self.documents
    }

    /// Files with a running worker, sorted.
    pub fn open_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<_> = self.workers.lock().keys().cloned().collect();
        files.sort();
        files
    }

    /// Start tracking `file` and schedule its first analysis.
    ///
    /// # Errors
    ///
    /// Fails when the worker thread cannot be spawned.
    pub fn open(&self, file: &Path, version: i64, text: impl Into<String>) -> std::io::Result<i64> {
        let stored = self.documents.add_or_replace(file, version, text);
        let worker = {
            let mut workers = self.workers.lock();
            match workers.get(file) {
                Some(worker) => Arc::clone(worker),
                None => {
                    let worker = Arc::new(Worker::spawn(
                        file.to_path_buf(),
                        Arc::clone(&self.analyzer),
                        Arc::clone(&self.callbacks),
                        Arc::clone(&self.semaphore),
                    )?);
                    workers.insert(file.to_path_buf(), Arc::clone(&worker));
                    worker
                }
            }
        };
        self.submit(&worker, file, true, None);
        Ok(stored)
    }

    /// Apply `edits` and schedule a re-analysis of the result.
    pub fn change(
        &self,
        file: &Path,
        version: i64,
        edits: &[TextEdit],
        want_diagnostics: bool,
    ) -> Result<i64, EditError> {
        let stored = self.documents.update(file, version, true, edits)?;
        match self.worker(file) {
            Some(worker) => {
                self.submit(&worker, file, want_diagnostics, invalidated_lines(edits));
            }
            None => warn!(file = %file.display(), "change for a file that is not open"),
        }
        Ok(stored)
    }

    /// Stop analyzing `file` and forget its text.
    pub fn close(&self, file: &Path) {
        let worker = self.workers.lock().remove(file);
        if let Some(worker) = worker {
            worker.shutdown();
        }
        self.documents.remove(file);
        debug!(file = %file.display(), "closed");
    }

    /// Re-analyze the stored text of `file`, e.g. after a dependency changed.
    pub fn schedule_update(&self, file: &Path, want_diagnostics: bool) -> bool {
        match self.worker(file) {
            Some(worker) => self.submit(&worker, file, want_diagnostics, None),
            None => false,
        }
    }

    /// Run `callback` with an analysis at least as fresh as every update
    /// scheduled for `file` so far.
    pub fn run_with_latest_analysis(
        &self,
        file: &Path,
        callback: impl FnOnce(Result<Arc<AnalysisResult>, ReadError>) + Send + 'static,
    ) {
        self.read(file, None, Box::new(callback));
    }

    /// Like [`run_with_latest_analysis`](Self::run_with_latest_analysis), but
    /// a queued update that leaves `position`'s line alone is not waited for.
    pub fn run_with_analysis_near_position(
        &self,
        file: &Path,
        position: Position,
        callback: impl FnOnce(Result<Arc<AnalysisResult>, ReadError>) + Send + 'static,
    ) {
        self.read(file, Some(position), Box::new(callback));
    }

    /// Block for the latest analysis of `file`, up to `deadline`.
    pub fn latest_analysis(&self, file: &Path, deadline: Deadline) -> Option<Arc<AnalysisResult>> {
        type Slot = (Mutex<Option<Result<Arc<AnalysisResult>, ReadError>>>, Condvar);
        let slot: Arc<Slot> = Arc::default();
        let filled = Arc::clone(&slot);
        self.run_with_latest_analysis(file, move |result| {
            *filled.0.lock() = Some(result);
            filled.1.notify_all();
        });
        let mut outcome = slot.0.lock();
        wait_until(&mut outcome, &slot.1, deadline, Option::is_some);
        outcome.take().and_then(Result::ok)
    }

    /// Wait until no file has queued or running analysis work.
    pub fn block_until_idle(&self, deadline: Deadline) -> bool {
        let workers: Vec<_> = self.workers.lock().values().cloned().collect();
        workers.iter().all(|worker| worker.wait_idle(deadline))
    }

    /// Shut every worker down. Pending reads are cancelled.
    pub fn shutdown(&self) {
        let workers: Vec<_> = self.workers.lock().drain().map(|(_, w)| w).collect();
        for worker in workers {
            worker.shutdown();
        }
    }

    fn worker(&self, file: &Path) -> Option<Arc<Worker>> {
        self.workers.lock().get(file).cloned()
    }

    fn submit(
        &self,
        worker: &Worker,
        file: &Path,
        want_diagnostics: bool,
        touched: Option<std::ops::RangeInclusive<usize>>,
    ) -> bool {
        let doc = self.documents.get(file);
        if doc.is_unknown() {
            return false;
        }
        worker.schedule(Update {
            inputs: FileInputs::new(file, doc.version, doc.text),
            want_diagnostics,
            touched,
        })
    }

    fn read(&self, file: &Path, position: Option<Position>, action: ReadAction) {
        match self.worker(file) {
            Some(worker) => worker.read(position, action),
            None => action(Err(ReadError::UnknownFile(file.to_path_buf()))),
        }
    }
}

impl Drop for AnalysisScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AnalysisScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisScheduler")
            .field("open_files", &self.workers.lock().len())
            .field("semaphore", &self.semaphore)
            .finish_non_exhaustive()
    }
}
