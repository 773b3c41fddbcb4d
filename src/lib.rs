//! # weft-base
//!
//! Analysis core for a language server: keeps per-file analysis fresh while
//! documents change, caches compiled packages, tracks which packages import
//! which, and builds a persistent index of declaration packages.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! analysis  → Per-file workers, update coalescing, reads
//!   ↓
//! index     → Bulk indexing, task pool, on-disk shards
//!   ↓
//! project   → Package layout, compile orchestration, rebuilds
//!   ↓
//! compile   → Compiler instances, LRU cache, package objects
//! graph     → Package dependency graph
//!   ↓
//! document  → Versioned document store, text edits
//! syntax    → Lexer and header scanner
//!   ↓
//! sync      → Deadlines, semaphore, named thread pools
//! base      → Positions, offsets, package names, constants
//! ```

// ============================================================================
// MODULES (dependency order: base → sync → syntax → document → graph →
//          compile → project → index → analysis)
// ============================================================================

/// Foundation types: Position, Span, offsets, PackageName
pub mod base;

/// Concurrency primitives: Deadline, Semaphore, thread pools
pub mod sync;

/// Reference frontend: lexer and header scanner
pub mod syntax;

/// Versioned document store and text edits
pub mod document;

/// Package dependency graph
pub mod graph;

/// Compiler instances, instance cache, package objects
pub mod compile;

/// Initialization options
pub mod config;

/// Package layout and compile orchestration
pub mod project;

/// Bulk indexing of declaration packages
pub mod index;

/// Per-file analysis scheduling
pub mod analysis;

// Re-export the entry points
pub use analysis::{AnalysisCallbacks, AnalysisResult, AnalysisScheduler, FileAnalyzer, ReadError};
pub use base::{PackageName, Position, Span};
pub use compile::{CompileError, InstanceCache, PackageCompiler, SourceCompiler};
pub use config::Options;
pub use document::{DocumentStore, TextEdit};
pub use graph::DependencyGraph;
pub use index::BulkIndexer;
pub use project::ProjectContext;
