//! Compiling packages and keeping the results around.
//!
//! - [`PackageCompiler`] - the compile step, pluggable
//! - [`SourceCompiler`] - reference implementation on top of the scanner
//! - [`InstanceCache`] - LRU of compiled instances with off-thread teardown
//! - [`PackageObjectStore`] - exported package objects and their freshness

mod cache;
mod error;
mod instance;
mod objects;
mod reaper;
mod source;

pub use cache::InstanceCache;
pub use error::CompileError;
pub use instance::{
    CompilerInstance, ExportTable, ExportedSymbol, PackageSources, SourceFile, Symbol, SymbolRef,
    UpstreamObjects,
};
pub use objects::{DataStatus, PackageObject, PackageObjectStore};
pub use reaper::Reaper;
pub use source::SourceCompiler;

/// Turns the sources of one package plus the package objects of its
/// upstream packages into a compiled instance.
///
/// Implementations must be callable from several threads at once; the bulk
/// indexer compiles independent packages in parallel.
pub trait PackageCompiler: Send + Sync {
    fn compile(
        &self,
        sources: &PackageSources,
        upstream: &UpstreamObjects,
    ) -> Result<CompilerInstance, CompileError>;
}
