//! Bulk indexing of declaration packages.
//!
//! A build loads every declaration file under the configured roots, wires the
//! packages into the dependency graph and compiles them on a [`TaskPool`],
//! each package waiting for the packages it imports. Every compiled package
//! yields an [`IndexShard`]. When a cache directory is configured the shards
//! are written there and sealed with a validity marker; a later build that
//! finds an intact marker loads the shards instead of compiling.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use super::error::IndexError;
use super::shard::IndexShard;
use super::storage::ShardStorage;
use super::task_pool::{TaskId, TaskPool};
use crate::base::PackageName;
use crate::base::constants::DECLARATION_EXTENSION;
use crate::compile::Symbol;
use crate::project::ProjectContext;

/// Outcome of one [`BulkIndexer::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Packages found under the roots.
    pub packages: usize,
    /// Packages compiled in this build; zero when loaded from the cache.
    pub compiled: usize,
    pub from_cache: bool,
    pub failed: Vec<PackageName>,
    /// Digest written to the validity marker, if one was written.
    pub digest: Option<String>,
}

#[derive(Default)]
struct Recorded {
    symbols: RwLock<IndexMap<PackageName, IndexMap<SmolStr, Symbol>>>,
    failed: Mutex<Vec<PackageName>>,
}

impl Recorded {
    fn record(&self, shard: &IndexShard) {
        let symbols = shard
            .symbols
            .iter()
            .map(|s| (s.id.clone(), s.clone()))
            .collect();
        self.symbols.write().insert(shard.package.clone(), symbols);
    }
}

pub struct BulkIndexer {
    context: Arc<ProjectContext>,
    storage: Option<ShardStorage>,
    roots: Vec<PathBuf>,
    threads: usize,
    recorded: Arc<Recorded>,
    indexing: AtomicBool,
}

/// Clears the in-progress flag when a build ends, however it ends.
struct Indexing<'a>(&'a AtomicBool);

impl Drop for Indexing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BulkIndexer {
    /// An indexer over the declaration roots and cache directory configured
    /// in the context's options.
    pub fn new(context: Arc<ProjectContext>) -> Self {
        let options = context.options();
        Self {
            storage: options.cache_dir.as_ref().map(ShardStorage::new),
            roots: options.declaration_roots.clone(),
            threads: options.index_threads,
            recorded: Arc::default(),
            indexing: AtomicBool::new(false),
            context,
        }
    }

    pub fn storage(&self) -> Option<&ShardStorage> {
        self.storage.as_ref()
    }

    pub fn is_indexing(&self) -> bool {
        self.indexing.load(Ordering::Acquire)
    }

    /// Index every declaration package, blocking until all are done.
    pub fn build(&self) -> Result<IndexReport, IndexError> {
        if self.indexing.swap(true, Ordering::AcqRel) {
            return Err(IndexError::Busy);
        }
        let _indexing = Indexing(&self.indexing);

        let packages = self
            .context
            .load(&self.roots, DECLARATION_EXTENSION, false)?;
        let mut report = IndexReport {
            packages: packages.len(),
            ..IndexReport::default()
        };

        if let Some(storage) = &self.storage
            && storage.is_valid()
        {
            let shards = storage.load_all()?;
            for shard in &shards {
                self.recorded.record(shard);
            }
            info!(shards = shards.len(), "index is up to date, loaded shards from cache");
            report.from_cache = true;
            return Ok(report);
        }
        if let Some(storage) = &self.storage {
            storage.clear()?;
        }

        let order = self.build_order(&packages);
        let ids: FxHashMap<&PackageName, TaskId> = order
            .iter()
            .enumerate()
            .map(|(i, package)| (package, i as TaskId))
            .collect();

        let pool = TaskPool::new(self.threads);
        for package in &order {
            let dependencies: Vec<TaskId> = self
                .context
                .graph()
                .dependencies(package)
                .iter()
                .filter_map(|upstream| ids.get(upstream).copied())
                .collect();
            let context = Arc::clone(&self.context);
            let storage = self.storage.clone();
            let recorded = Arc::clone(&self.recorded);
            let id = ids[package];
            let package = package.clone();
            pool.add_task(id, dependencies, move || {
                if let Err(err) = index_package(&context, storage.as_ref(), &recorded, &package) {
                    warn!(%package, %err, "failed to index package");
                    recorded.failed.lock().push(package);
                }
            });
        }
        pool.wait_until_all_complete();

        let mut failed = std::mem::take(&mut *self.recorded.failed.lock());
        failed.sort();
        report.compiled = order.len() - failed.len();
        report.failed = failed;

        if let Some(storage) = &self.storage
            && report.failed.is_empty()
            && pool.panicked() == 0
        {
            report.digest = Some(storage.write_marker()?);
        }
        info!(
            packages = report.packages,
            compiled = report.compiled,
            failed = report.failed.len(),
            "bulk index built"
        );
        Ok(report)
    }

    /// Where `symbol_id` is declared within `package`.
    pub fn symbol_declaration(&self, package: &str, symbol_id: &str) -> Option<Symbol> {
        self.recorded
            .symbols
            .read()
            .get(package)
            .and_then(|symbols| symbols.get(symbol_id))
            .cloned()
    }

    /// Indexed symbols of `package`.
    pub fn symbols_of(&self, package: &str) -> Vec<Symbol> {
        self.recorded
            .symbols
            .read()
            .get(package)
            .map(|symbols| symbols.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Packages with recorded symbols, in the order they were indexed.
    pub fn indexed_packages(&self) -> Vec<PackageName> {
        self.recorded.symbols.read().keys().cloned().collect()
    }

    /// `packages` ordered so each package comes after the ones it imports,
    /// as far as cycles allow.
    fn build_order(&self, packages: &[PackageName]) -> Vec<PackageName> {
        let members: FxHashSet<&PackageName> = packages.iter().collect();
        let mut visited = FxHashSet::default();
        let mut order = Vec::with_capacity(packages.len());
        for package in packages {
            self.post_order(package, &members, &mut visited, &mut order);
        }
        order
    }

    fn post_order(
        &self,
        package: &PackageName,
        members: &FxHashSet<&PackageName>,
        visited: &mut FxHashSet<PackageName>,
        order: &mut Vec<PackageName>,
    ) {
        if !visited.insert(package.clone()) {
            return;
        }
        for upstream in self.context.graph().dependencies(package) {
            if members.contains(&upstream) {
                self.post_order(&upstream, members, visited, order);
            }
        }
        order.push(package.clone());
    }
}

fn index_package(
    context: &ProjectContext,
    storage: Option<&ShardStorage>,
    recorded: &Recorded,
    package: &PackageName,
) -> Result<(), IndexError> {
    let sources = context.sources(package)?;
    let upstream = context.upstream_objects(package);
    let instance = context.compiler().compile(&sources, &upstream)?;
    let (instance, _) = context.install(instance, true);
    let shard = IndexShard::from_instance(&instance);
    if let Some(storage) = storage {
        storage.write_shard(&shard)?;
    }
    recorded.record(&shard);
    debug!(%package, symbols = shard.symbols.len(), "indexed package");
    Ok(())
}

impl std::fmt::Debug for BulkIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkIndexer")
            .field("roots", &self.roots)
            .field("indexing", &self.is_indexing())
            .finish_non_exhaustive()
    }
}
