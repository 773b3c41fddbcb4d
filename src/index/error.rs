//! Error types for bulk indexing.

use std::path::PathBuf;

use thiserror::Error;

use crate::compile::CompileError;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Reading or writing the index directory failed.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A shard could not be encoded or decoded.
    #[error("invalid shard {}: {source}", path.display())]
    Shard {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Loading the sources to index failed.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Another build is already running on this indexer.
    #[error("indexing is already in progress")]
    Busy,
}

impl IndexError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn shard(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Shard {
            path: path.into(),
            source,
        }
    }
}
