//! Keeping per-file analysis results fresh while the user types.
//!
//! [`AnalysisScheduler`] runs one worker thread per open file. Edits become
//! updates, and updates that pile up before the worker gets to them are
//! coalesced so only the newest text is compiled. Feature requests are reads:
//! a callback that runs once a sufficiently fresh [`AnalysisResult`] exists.

mod result;
mod scheduler;
mod worker;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::compile::CompileError;
use crate::syntax::Diagnostic;

pub use result::{AnalysisResult, FileInputs};
pub use scheduler::AnalysisScheduler;

/// Produces the analysis of one file version.
pub trait FileAnalyzer: Send + Sync {
    fn analyze(&self, inputs: &FileInputs) -> Result<AnalysisResult, CompileError>;
}

/// Notifications from analysis workers. Called on the worker's thread.
pub trait AnalysisCallbacks: Send + Sync {
    /// Diagnostics for `version` of `file`, after an update that asked for them.
    fn on_diagnostics(&self, file: &Path, version: i64, diagnostics: &[Diagnostic]);
}

/// Callbacks that ignore everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallbacks;

impl AnalysisCallbacks for NoCallbacks {
    fn on_diagnostics(&self, _file: &Path, _version: i64, _diagnostics: &[Diagnostic]) {}
}

/// Why a read could not be served.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The worker shut down before the read could run.
    #[error("analysis was cancelled")]
    Cancelled,

    /// No worker exists for the file.
    #[error("file is not open: {}", .0.display())]
    UnknownFile(PathBuf),

    /// The file has not been analyzed yet.
    #[error("file has not been analyzed")]
    NotAnalyzed,
}
