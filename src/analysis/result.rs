//! Inputs and outputs of a single-file analysis.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::base::{PackageName, Position, Span};
use crate::compile::{CompilerInstance, Symbol};
use crate::syntax::{Diagnostic, SourceSummary, codes};

/// Snapshot of one document handed to an analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInputs {
    pub file: PathBuf,
    pub version: i64,
    pub text: Arc<str>,
}

impl FileInputs {
    pub fn new(file: impl Into<PathBuf>, version: i64, text: impl Into<Arc<str>>) -> Self {
        Self {
            file: file.into(),
            version,
            text: text.into(),
        }
    }
}

/// Immutable result of analyzing one version of a file.
///
/// Holds only what this file needs from its package's compile, never the
/// cached instance itself, so replacing a cache entry frees it on the reaper.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub file: PathBuf,
    pub version: i64,
    pub text: Arc<str>,
    pub summary: SourceSummary,
    pub diagnostics: Vec<Diagnostic>,
    /// The package the file was compiled as.
    pub package: Option<PackageName>,
    /// Symbols declared in this file.
    pub symbols: Vec<Symbol>,
    /// Names referenced in this file, mapped to the symbol ids they resolve to.
    pub resolved: IndexMap<SmolStr, SmolStr>,
    /// Set when compilation failed and only a placeholder is available.
    pub degraded: bool,
}

impl AnalysisResult {
    pub fn new(inputs: &FileInputs, summary: SourceSummary, package: &CompilerInstance) -> Self {
        let resolved = summary
            .references
            .iter()
            .filter_map(|r| {
                package
                    .resolve(&r.name)
                    .map(|id| (r.name.clone(), id.clone()))
            })
            .collect();
        Self {
            file: inputs.file.clone(),
            version: inputs.version,
            text: Arc::clone(&inputs.text),
            diagnostics: package.diagnostics_for(&inputs.file).to_vec(),
            symbols: package.symbols_in(&inputs.file).cloned().collect(),
            package: Some(package.package.clone()),
            resolved,
            summary,
            degraded: false,
        }
    }

    /// A placeholder for a failed compile, carrying one error diagnostic.
    pub fn degraded(inputs: &FileInputs, reason: impl fmt::Display) -> Self {
        let diagnostic = Diagnostic::error(Span::default(), format!("analysis failed: {reason}"))
            .with_code(codes::COMPILE_FAILED);
        Self {
            file: inputs.file.clone(),
            version: inputs.version,
            text: Arc::clone(&inputs.text),
            summary: SourceSummary::default(),
            diagnostics: vec![diagnostic],
            package: None,
            symbols: Vec::new(),
            resolved: IndexMap::new(),
            degraded: true,
        }
    }

    /// Id of the symbol declared or referenced at `position`.
    pub fn symbol_at(&self, position: Position) -> Option<SmolStr> {
        if let Some(decl) = self.summary.declaration_at(position) {
            return self
                .symbols
                .iter()
                .find(|s| s.name == decl.name)
                .map(|s| s.id.clone());
        }
        let reference = self.summary.reference_at(position)?;
        self.resolved.get(&reference.name).cloned()
    }
}
