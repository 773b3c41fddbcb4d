//! Diagnostics reported by scanning and compilation.

use std::sync::Arc;

use crate::base::Span;

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    /// Convert to LSP severity number.
    pub fn to_lsp(&self) -> u32 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Info => 3,
            Severity::Hint => 4,
        }
    }
}

/// A diagnostic message with location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub span: Span,
    pub severity: Severity,
    /// Error/warning code (e.g., "E0001").
    pub code: Option<&'static str>,
    pub message: Arc<str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(span: Span, message: impl Into<Arc<str>>) -> Self {
        Self {
            span,
            severity: Severity::Error,
            code: None,
            message: message.into(),
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(span: Span, message: impl Into<Arc<str>>) -> Self {
        Self {
            span,
            severity: Severity::Warning,
            code: None,
            message: message.into(),
        }
    }

    /// Set the error code.
    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Diagnostic codes.
///
/// - **E0001-E0099**: scan and compile errors
/// - **W0001-W0099**: warnings
pub mod codes {
    /// Malformed `package` declaration.
    pub const MALFORMED_PACKAGE: &str = "E0001";
    /// Malformed `import` declaration.
    pub const MALFORMED_IMPORT: &str = "E0002";
    /// Declared package does not match the package being compiled.
    pub const PACKAGE_MISMATCH: &str = "E0003";
    /// Compilation failed or panicked; the result is degraded.
    pub const COMPILE_FAILED: &str = "E0004";
    /// Unbalanced braces.
    pub const UNBALANCED_BRACES: &str = "E0005";
    /// Duplicate top-level declaration.
    pub const DUPLICATE_DECLARATION: &str = "E0006";

    /// `package` declaration after other items.
    pub const LATE_PACKAGE: &str = "W0001";
    /// Import that no known package provides.
    pub const UNRESOLVED_IMPORT: &str = "W0002";
}
