//! Instrumented analyzers, compilers and callbacks.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use weft::analysis::{AnalysisCallbacks, AnalysisResult, FileAnalyzer, FileInputs};
use weft::compile::{
    CompileError, CompilerInstance, PackageCompiler, PackageSources, SourceCompiler,
    UpstreamObjects,
};
use weft::sync::{Deadline, wait_until};
use weft::syntax::{Diagnostic, scan};

/// A latch that blocks callers while closed.
#[derive(Default)]
pub struct Gate {
    closed: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    pub fn closed() -> Self {
        Self {
            closed: Mutex::new(true),
            changed: Condvar::new(),
        }
    }

    pub fn open(&self) {
        *self.closed.lock() = false;
        self.changed.notify_all();
    }

    pub fn close(&self) {
        *self.closed.lock() = true;
    }

    fn pass(&self) {
        let mut closed = self.closed.lock();
        while *closed {
            self.changed.wait(&mut closed);
        }
    }
}

/// Counts calls and waits for a count to be reached.
#[derive(Default)]
pub struct Counter {
    count: Mutex<usize>,
    changed: Condvar,
}

impl Counter {
    pub fn bump(&self) {
        *self.count.lock() += 1;
        self.changed.notify_all();
    }

    pub fn get(&self) -> usize {
        *self.count.lock()
    }

    /// Wait up to five seconds for the count to reach `n`.
    pub fn wait_for(&self, n: usize) -> bool {
        let mut count = self.count.lock();
        let deadline = Deadline::after(Duration::from_secs(5));
        wait_until(&mut count, &self.changed, deadline, |c| *c >= n)
    }
}

/// Records every analyzed version and blocks inside `analyze` while its
/// gate is closed.
#[derive(Default)]
pub struct GatedAnalyzer {
    pub gate: Gate,
    pub started: Counter,
    analyzed: Mutex<Vec<(PathBuf, i64)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl GatedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Gate::closed(),
            ..Self::default()
        }
    }

    /// Versions analyzed for `file`, in order.
    pub fn versions(&self, file: &Path) -> Vec<i64> {
        self.analyzed
            .lock()
            .iter()
            .filter(|(f, _)| f == file)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn total(&self) -> usize {
        self.analyzed.lock().len()
    }

    /// Most analyses seen running at the same time.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl FileAnalyzer for GatedAnalyzer {
    fn analyze(&self, inputs: &FileInputs) -> Result<AnalysisResult, CompileError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.started.bump();
        self.gate.pass();
        self.analyzed
            .lock()
            .push((inputs.file.clone(), inputs.version));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(AnalysisResult::new(
            inputs,
            scan(&inputs.text),
            &CompilerInstance::default(),
        ))
    }
}

/// Panics on any text containing `boom`.
#[derive(Default)]
pub struct PanickingAnalyzer;

impl FileAnalyzer for PanickingAnalyzer {
    fn analyze(&self, inputs: &FileInputs) -> Result<AnalysisResult, CompileError> {
        if inputs.text.contains("boom") {
            panic!("exploded on version {}", inputs.version);
        }
        Ok(AnalysisResult::new(
            inputs,
            scan(&inputs.text),
            &CompilerInstance::default(),
        ))
    }
}

/// Records published diagnostics as `(file, version, count)`.
#[derive(Default)]
pub struct RecordingCallbacks {
    published: Mutex<Vec<(PathBuf, i64, usize)>>,
}

impl RecordingCallbacks {
    pub fn published(&self) -> Vec<(PathBuf, i64, usize)> {
        self.published.lock().clone()
    }
}

impl AnalysisCallbacks for RecordingCallbacks {
    fn on_diagnostics(&self, file: &Path, version: i64, diagnostics: &[Diagnostic]) {
        self.published
            .lock()
            .push((file.to_path_buf(), version, diagnostics.len()));
    }
}

/// [`SourceCompiler`] that counts compiles and can be held at a gate.
#[derive(Default)]
pub struct CountingCompiler {
    pub gate: Gate,
    pub compiles: Counter,
    inner: SourceCompiler,
}

impl CountingCompiler {
    pub fn gated() -> Self {
        Self {
            gate: Gate::closed(),
            ..Self::default()
        }
    }
}

impl PackageCompiler for CountingCompiler {
    fn compile(
        &self,
        sources: &PackageSources,
        upstream: &UpstreamObjects,
    ) -> Result<CompilerInstance, CompileError> {
        self.compiles.bump();
        self.gate.pass();
        self.inner.compile(sources, upstream)
    }
}
