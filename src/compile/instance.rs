//! Compiled package state.

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::base::{PackageName, Span};
use crate::syntax::{DeclKind, Diagnostic, SourceSummary};

/// One source file handed to the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: Arc<str>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<Arc<str>>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// All sources of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSources {
    pub package: PackageName,
    pub files: Vec<SourceFile>,
}

/// Serialized package objects of upstream packages, keyed by package.
pub type UpstreamObjects = IndexMap<PackageName, Arc<[u8]>>;

/// A declared symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Package-qualified name, e.g. `std.collection.ArrayList`.
    pub id: SmolStr,
    pub name: SmolStr,
    pub kind: DeclKind,
    pub file: PathBuf,
    pub span: Span,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supertypes: Vec<SmolStr>,
}

/// A resolved use of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRef {
    /// Id of the referenced symbol.
    pub target: SmolStr,
    pub file: PathBuf,
    pub span: Span,
}

/// What a package exports to the packages importing it.
///
/// This is the content of the serialized package object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTable {
    pub package: PackageName,
    pub symbols: Vec<ExportedSymbol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedSymbol {
    pub name: SmolStr,
    pub kind: DeclKind,
    /// Package that declares the symbol; differs from the exporting package
    /// for names re-exported through `public import`.
    pub origin: PackageName,
}

impl ExportTable {
    pub fn get(&self, name: &str) -> Option<&ExportedSymbol> {
        self.symbols.iter().find(|s| s.name == name)
    }
}

/// Heavyweight compiled state of one package.
///
/// Instances are built once and then only shared read-only; the cache hands
/// out `Arc` handles and destroys the last owner off the calling thread.
#[derive(Debug, Clone, Default)]
pub struct CompilerInstance {
    pub package: PackageName,
    pub files: IndexMap<PathBuf, SourceSummary>,
    /// Symbols declared in this package, by name.
    pub symbols: IndexMap<SmolStr, Symbol>,
    /// Names brought in by imports, mapped to the id they resolve to.
    pub imported: IndexMap<SmolStr, SmolStr>,
    pub refs: Vec<SymbolRef>,
    pub diagnostics: IndexMap<PathBuf, Vec<Diagnostic>>,
    /// Serialized [`ExportTable`].
    pub object: Arc<[u8]>,

    pub import_packages: FxHashSet<PackageName>,
    pub downstream_pkgs: FxHashSet<PackageName>,
    pub in_degree: usize,
    pub is_in_module: bool,
}

impl CompilerInstance {
    /// Symbols declared in `file`.
    pub fn symbols_in<'a>(&'a self, file: &'a std::path::Path) -> impl Iterator<Item = &'a Symbol> {
        self.symbols.values().filter(move |s| s.file == file)
    }

    /// Resolve a name as seen from inside this package.
    pub fn resolve(&self, name: &str) -> Option<&SmolStr> {
        self.symbols
            .get(name)
            .map(|s| &s.id)
            .or_else(|| self.imported.get(name))
    }

    pub fn diagnostics_for(&self, file: &std::path::Path) -> &[Diagnostic] {
        self.diagnostics.get(file).map_or(&[], Vec::as_slice)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .values()
            .flatten()
            .any(Diagnostic::is_error)
    }
}
