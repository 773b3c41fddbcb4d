//! Error types for compiling packages.

use std::path::PathBuf;

use thiserror::Error;

use crate::base::PackageName;

/// Errors that can occur while compiling a package or a single file.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A source file could not be read.
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A package object could not be encoded or decoded.
    #[error("package object error for {package}: {source}")]
    Object {
        package: PackageName,
        #[source]
        source: serde_json::Error,
    },

    /// The package has no known sources.
    #[error("unknown package: {0}")]
    UnknownPackage(PackageName),

    /// The compiler itself reported a failure.
    #[error("compilation of {package} failed: {message}")]
    Failed {
        package: PackageName,
        message: String,
    },
}

impl CompileError {
    /// Create an IO error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a package object encoding error.
    pub fn object(package: impl Into<PackageName>, source: serde_json::Error) -> Self {
        Self::Object {
            package: package.into(),
            source,
        }
    }

    /// Create a generic compiler failure.
    pub fn failed(package: impl Into<PackageName>, message: impl Into<String>) -> Self {
        Self::Failed {
            package: package.into(),
            message: message.into(),
        }
    }
}
