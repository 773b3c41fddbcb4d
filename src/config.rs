//! Runtime options.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::base::constants::{DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_CONCURRENT_ANALYSES};

/// Options for the analysis core.
///
/// Deserializes from the editor's initialization options, where keys are
/// camelCase and every key is optional:
///
/// ```json
/// { "cacheCapacity": 64, "cacheDir": "/tmp/weft", "declarationRoots": ["/sdk/decls"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Compiler instances kept in the LRU cache
    pub cache_capacity: usize,
    /// Files analyzed at the same time across all workers
    pub max_concurrent_analyses: usize,
    /// Worker threads of the bulk indexer
    pub index_threads: usize,
    /// Threads tearing down evicted instances
    pub reaper_threads: usize,
    /// Where index shards and the validity marker live; no persistence if unset
    pub cache_dir: Option<PathBuf>,
    /// Directories of declaration files indexed in bulk
    pub declaration_roots: Vec<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_concurrent_analyses: DEFAULT_MAX_CONCURRENT_ANALYSES,
            index_threads: std::thread::available_parallelism().map_or(1, usize::from),
            reaper_threads: 1,
            cache_dir: None,
            declaration_roots: Vec::new(),
        }
    }
}

/// Errors from reading options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The options JSON has the wrong shape.
    #[error("invalid initialization options: {0}")]
    Json(#[from] serde_json::Error),

    /// A numeric option is out of range.
    #[error("{name} must be at least 1")]
    Zero { name: &'static str },
}

impl Options {
    /// Parse editor initialization options. `null` yields the defaults.
    pub fn from_initialization_options(value: &serde_json::Value) -> Result<Self, ConfigError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let options = Self::deserialize(value)?;
        options.validate()?;
        Ok(options)
    }

    /// Check that every count is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("cacheCapacity", self.cache_capacity),
            ("maxConcurrentAnalyses", self.max_concurrent_analyses),
            ("indexThreads", self.index_threads),
            ("reaperThreads", self.reaper_threads),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { name });
            }
        }
        Ok(())
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_max_concurrent_analyses(mut self, count: usize) -> Self {
        self.max_concurrent_analyses = count;
        self
    }

    pub fn with_index_threads(mut self, threads: usize) -> Self {
        self.index_threads = threads;
        self
    }

    pub fn with_reaper_threads(mut self, threads: usize) -> Self {
        self.reaper_threads = threads;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_declaration_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.declaration_roots.push(root.into());
        self
    }
}
