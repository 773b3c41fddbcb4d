//! On-disk shard storage and the validity marker.
//!
//! Layout under the cache directory:
//!
//! ```text
//! <cache>/index/<package>.idx   one JSON shard per package
//! <cache>/valid.txt             SHA-256 hex digest of all shards
//! ```
//!
//! The digest covers every shard sorted by path, feeding each file's name
//! and then its contents into one hasher. A marker that matches the shards
//! on disk means the previous build completed and nothing was modified.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use super::error::IndexError;
use super::shard::IndexShard;
use crate::base::constants::{INDEX_DIR, SHARD_EXTENSION, VALID_MARKER_FILE};

#[derive(Debug, Clone)]
pub struct ShardStorage {
    root: PathBuf,
}

impl ShardStorage {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: cache_dir.into(),
        }
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join(INDEX_DIR)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.root.join(VALID_MARKER_FILE)
    }

    pub fn shard_path(&self, package: &str) -> PathBuf {
        self.index_dir().join(format!("{package}.{SHARD_EXTENSION}"))
    }

    pub fn write_shard(&self, shard: &IndexShard) -> Result<PathBuf, IndexError> {
        let dir = self.index_dir();
        fs::create_dir_all(&dir).map_err(|e| IndexError::io(&dir, e))?;
        let path = self.shard_path(&shard.package);
        let bytes = serde_json::to_vec(shard).map_err(|e| IndexError::shard(&path, e))?;
        fs::write(&path, bytes).map_err(|e| IndexError::io(&path, e))?;
        trace!(path = %path.display(), "wrote shard");
        Ok(path)
    }

    pub fn read_shard(&self, path: &Path) -> Result<IndexShard, IndexError> {
        let bytes = fs::read(path).map_err(|e| IndexError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| IndexError::shard(path, e))
    }

    /// Every shard file, sorted by path. A missing index directory has none.
    pub fn shard_files(&self) -> Result<Vec<PathBuf>, IndexError> {
        let dir = self.index_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(IndexError::io(&dir, e)),
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| IndexError::io(&dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == SHARD_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn load_all(&self) -> Result<Vec<IndexShard>, IndexError> {
        self.shard_files()?
            .iter()
            .map(|path| self.read_shard(path))
            .collect()
    }

    /// Digest of the current shards.
    pub fn digest(&self) -> Result<String, IndexError> {
        let mut hasher = Sha256::new();
        for path in self.shard_files()? {
            let name = path.strip_prefix(&self.root).unwrap_or(&path);
            hasher.update(name.to_string_lossy().as_bytes());
            let contents = fs::read(&path).map_err(|e| IndexError::io(&path, e))?;
            hasher.update(&contents);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Record the digest of the current shards as valid.
    pub fn write_marker(&self) -> Result<String, IndexError> {
        let digest = self.digest()?;
        fs::create_dir_all(&self.root).map_err(|e| IndexError::io(&self.root, e))?;
        let marker = self.marker_path();
        fs::write(&marker, &digest).map_err(|e| IndexError::io(&marker, e))?;
        debug!(digest = %digest, "wrote index validity marker");
        Ok(digest)
    }

    /// Whether the marker exists and matches the shards on disk.
    pub fn is_valid(&self) -> bool {
        let Ok(recorded) = fs::read_to_string(self.marker_path()) else {
            return false;
        };
        match self.digest() {
            Ok(digest) => recorded.trim() == digest,
            Err(err) => {
                debug!(%err, "cannot hash shards, treating index as invalid");
                false
            }
        }
    }

    /// Remove all shards and the marker.
    pub fn clear(&self) -> Result<(), IndexError> {
        let marker = self.marker_path();
        match fs::remove_file(&marker) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(IndexError::io(&marker, e)),
        }
        for path in self.shard_files()? {
            fs::remove_file(&path).map_err(|e| IndexError::io(&path, e))?;
        }
        Ok(())
    }
}
