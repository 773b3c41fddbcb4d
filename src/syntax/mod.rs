//! Reference frontend: lexing and header scanning.
//!
//! This is not a parser. It extracts exactly what the analysis core needs
//! from a source file: the declared package, the imports (for the dependency
//! graph), top-level declarations and identifier occurrences (for index
//! shards and position lookups), plus diagnostics for malformed headers.

pub mod diagnostic;
mod imports;
pub mod lexer;
mod scan;

pub use diagnostic::{Diagnostic, Severity, codes};
pub use imports::{ImportDecl, ImportSpec};
pub use scan::{DeclKind, Declaration, ExtendDecl, NameRef, SourceSummary, scan};
