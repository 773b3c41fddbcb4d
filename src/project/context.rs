//! One workspace's compile state.
//!
//! `ProjectContext` owns the instance cache, the dependency graph and the
//! package object store, and knows which files make up which package. It
//! compiles packages on demand, upstream first, and after a package changes
//! rebuilds only the dependents whose direct upstream objects changed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, trace};

use super::loader;
use crate::analysis::{AnalysisResult, FileAnalyzer, FileInputs};
use crate::base::PackageName;
use crate::base::constants::DEFAULT_PACKAGE;
use crate::compile::{
    CompileError, CompilerInstance, DataStatus, InstanceCache, PackageCompiler,
    PackageObjectStore, PackageSources, SourceFile, UpstreamObjects,
};
use crate::config::Options;
use crate::document::DocumentStore;
use crate::graph::{DependencyGraph, Upstream, recompute_upstream};
use crate::syntax::scan;

#[derive(Debug, Default)]
struct Layout {
    packages: FxHashMap<PackageName, BTreeSet<PathBuf>>,
    owners: FxHashMap<PathBuf, PackageName>,
}

/// Where a file was before being assigned to a package.
enum Move {
    Unchanged,
    /// Moved out of `from`, which still has other files.
    Left { from: PackageName },
    /// Moved out of `from`, which is now empty: a rename.
    Renamed { from: PackageName },
}

pub struct ProjectContext {
    options: Options,
    compiler: Arc<dyn PackageCompiler>,
    cache: InstanceCache,
    graph: DependencyGraph,
    objects: PackageObjectStore,
    documents: Option<Arc<DocumentStore>>,
    layout: RwLock<Layout>,
}

impl ProjectContext {
    pub fn new(options: Options, compiler: Arc<dyn PackageCompiler>) -> Self {
        Self {
            cache: InstanceCache::new(options.cache_capacity, options.reaper_threads),
            graph: DependencyGraph::new(),
            objects: PackageObjectStore::new(),
            documents: None,
            layout: RwLock::default(),
            compiler,
            options,
        }
    }

    /// Read open documents from `documents` instead of disk.
    pub fn with_documents(mut self, documents: Arc<DocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn compiler(&self) -> &Arc<dyn PackageCompiler> {
        &self.compiler
    }

    pub fn cache(&self) -> &InstanceCache {
        &self.cache
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn objects(&self) -> &PackageObjectStore {
        &self.objects
    }

    /// Files of `package`, sorted.
    pub fn files_of(&self, package: &str) -> Vec<PathBuf> {
        self.layout
            .read()
            .packages
            .get(package)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn package_of(&self, file: &Path) -> Option<PackageName> {
        self.layout.read().owners.get(file).cloned()
    }

    /// Load every file with `extension` under `roots`, track the packages
    /// in the graph and wire their edges. Returns the loaded packages.
    pub fn load(
        &self,
        roots: &[PathBuf],
        extension: &str,
        is_in_module: bool,
    ) -> Result<Vec<PackageName>, CompileError> {
        let packages = loader::load_packages(roots, extension)?;
        for (package, files) in &packages {
            for file in files {
                self.assign_file(&file.path, package);
            }
            self.graph.add_package(package.clone(), is_in_module);
        }
        let known = self.known_packages();
        for (package, files) in &packages {
            let upstream = upstream_of(files, &known);
            self.graph.update_edges(package, upstream.resolved, None);
        }
        debug!(packages = packages.len(), "loaded project sources");
        Ok(packages.into_keys().collect())
    }

    /// Current sources of `package`, preferring open document text.
    pub fn sources(&self, package: &str) -> Result<PackageSources, CompileError> {
        self.sources_with(package, None)
    }

    fn sources_with(
        &self,
        package: &str,
        overlay: Option<&FileInputs>,
    ) -> Result<PackageSources, CompileError> {
        let files = self.files_of(package);
        if files.is_empty() {
            return Err(CompileError::UnknownPackage(package.into()));
        }
        let files = files
            .iter()
            .map(|path| match overlay {
                Some(inputs) if inputs.file == *path => {
                    Ok(SourceFile::new(path.clone(), Arc::clone(&inputs.text)))
                }
                _ => self.read_file(path),
            })
            .collect::<Result<_, _>>()?;
        Ok(PackageSources {
            package: package.into(),
            files,
        })
    }

    /// The compiled instance of `package`, building it (and any upstream
    /// package without a fresh object) when the cached one is missing or
    /// stale.
    pub fn compile_package(&self, package: &str) -> Result<Arc<CompilerInstance>, CompileError> {
        let mut visiting = FxHashSet::default();
        self.ensure_compiled(package, &mut visiting)
    }

    /// Rebuild `package`, then every dependent whose direct upstream object
    /// changed, in dependency order. Dependents reached only through
    /// unchanged objects are marked fresh without rebuilding. Returns the
    /// rebuilt packages.
    pub fn incremental_rebuild(&self, package: &str) -> Result<Vec<PackageName>, CompileError> {
        let order = self.graph.incremental_order(package);
        let mut changed: FxHashSet<PackageName> = FxHashSet::default();
        let mut rebuilt = Vec::new();
        for (i, current) in order.iter().enumerate() {
            let needed = i == 0
                || self.objects.get(current).is_none()
                || self
                    .graph
                    .dependencies(current)
                    .iter()
                    .any(|u| changed.contains(u));
            if !needed {
                trace!(package = %current, "upstream objects unchanged, keeping");
                self.objects
                    .update_status(std::slice::from_ref(current), DataStatus::Fresh);
                continue;
            }
            let (_, object_changed) = self.rebuild(current)?;
            if object_changed {
                changed.insert(current.clone());
            }
            rebuilt.push(current.clone());
        }
        debug!(package, rebuilt = rebuilt.len(), "incremental rebuild done");
        Ok(rebuilt)
    }

    /// Rebuild every module package in dependency order. Returns how many
    /// packages were compiled.
    pub fn full_rebuild(&self) -> Result<usize, CompileError> {
        let order = self.graph.topological_order();
        for package in &order {
            self.rebuild(package)?;
            if let Some(documents) = &self.documents {
                for file in self.files_of(package) {
                    documents.mark_initially_compiled(&file);
                }
            }
        }
        info!(packages = order.len(), "full rebuild done");
        Ok(order.len())
    }

    /// Collect the package objects `package` imports.
    pub fn upstream_objects(&self, package: &str) -> UpstreamObjects {
        self.graph
            .dependencies(package)
            .into_iter()
            .filter_map(|upstream| match self.objects.get(&upstream) {
                Some(object) => Some((upstream, object)),
                None => {
                    trace!(package, %upstream, "no package object for upstream");
                    None
                }
            })
            .collect()
    }

    /// Store a compiled instance: publish its package object, invalidate
    /// dependents if the object changed and cache the instance.
    ///
    /// With `bulk`, the instance is cached only while the cache has room.
    pub fn install(&self, mut instance: CompilerInstance, bulk: bool) -> (Arc<CompilerInstance>, bool) {
        let package = instance.package.clone();
        if let Some(entry) = self.graph.entry(&package) {
            instance.downstream_pkgs = entry.downstream_pkgs;
            instance.is_in_module = entry.is_in_module;
        }
        let changed = self.objects.set(package.clone(), Arc::clone(&instance.object));
        if changed {
            self.objects.invalidate_downstream(&package, &self.graph);
        }
        let instance = Arc::new(instance);
        if bulk {
            self.cache
                .set_if_room_for_bulk_load(package, Arc::clone(&instance));
        } else {
            self.cache.set_shared(package, Arc::clone(&instance));
        }
        (instance, changed)
    }

    fn ensure_compiled(
        &self,
        package: &str,
        visiting: &mut FxHashSet<PackageName>,
    ) -> Result<Arc<CompilerInstance>, CompileError> {
        if self.objects.is_fresh(package)
            && let Some(instance) = self.cache.get(package)
        {
            return Ok(instance);
        }
        visiting.insert(package.into());
        for upstream in self.graph.dependencies(package) {
            if !visiting.contains(&upstream) && !self.objects.is_fresh(&upstream) {
                self.ensure_compiled(&upstream, visiting)?;
            }
        }
        Ok(self.rebuild(package)?.0)
    }

    fn rebuild(&self, package: &str) -> Result<(Arc<CompilerInstance>, bool), CompileError> {
        let sources = self.sources(package)?;
        self.build(&sources, false)
    }

    fn build(
        &self,
        sources: &PackageSources,
        bulk: bool,
    ) -> Result<(Arc<CompilerInstance>, bool), CompileError> {
        let upstream = self.upstream_objects(&sources.package);
        let instance = self.compiler.compile(sources, &upstream)?;
        trace!(package = %sources.package, upstream = upstream.len(), "compiled package");
        Ok(self.install(instance, bulk))
    }

    fn read_file(&self, path: &Path) -> Result<SourceFile, CompileError> {
        if let Some(documents) = &self.documents {
            let doc = documents.get(path);
            if !doc.is_unknown() {
                return Ok(SourceFile::new(path, doc.text));
            }
        }
        loader::read_source(path)
    }

    fn known_packages(&self) -> FxHashSet<PackageName> {
        self.graph.packages().into_iter().collect()
    }

    fn assign_file(&self, file: &Path, package: &PackageName) -> Move {
        let mut layout = self.layout.write();
        let previous = layout.owners.insert(file.to_path_buf(), package.clone());
        layout
            .packages
            .entry(package.clone())
            .or_default()
            .insert(file.to_path_buf());
        let Some(from) = previous.filter(|p| p != package) else {
            return Move::Unchanged;
        };
        let emptied = layout.packages.get_mut(&from).is_none_or(|files| {
            files.remove(file);
            files.is_empty()
        });
        if emptied {
            layout.packages.remove(&from);
            Move::Renamed { from }
        } else {
            Move::Left { from }
        }
    }
}

impl FileAnalyzer for ProjectContext {
    /// Compile the package `inputs.file` belongs to, with the file's new
    /// text, after making sure its upstream packages are fresh.
    fn analyze(&self, inputs: &FileInputs) -> Result<AnalysisResult, CompileError> {
        let summary = scan(&inputs.text);
        let package = summary
            .package
            .clone()
            .unwrap_or_else(|| PackageName::from(DEFAULT_PACKAGE));

        let previous = match self.assign_file(&inputs.file, &package) {
            Move::Unchanged => None,
            Move::Left { from } => {
                debug!(file = %inputs.file.display(), %from, to = %package, "file changed package");
                self.objects
                    .update_status(std::slice::from_ref(&from), DataStatus::Stale);
                None
            }
            Move::Renamed { from } => {
                debug!(%from, to = %package, "package renamed");
                self.objects.remove(&from);
                self.cache.erase(&from);
                Some(from)
            }
        };
        if !self.graph.contains(&package) {
            self.graph.add_package(package.clone(), true);
        }

        let sources = self.sources_with(&package, Some(inputs))?;
        let upstream = upstream_of(&sources.files, &self.known_packages());
        self.graph
            .update_edges(&package, upstream.resolved, previous.as_ref());

        let mut visiting = FxHashSet::from_iter([package.clone()]);
        for dependency in self.graph.dependencies(&package) {
            if !self.objects.is_fresh(&dependency) {
                self.ensure_compiled(&dependency, &mut visiting)?;
            }
        }
        let (instance, _) = self.build(&sources, false)?;
        Ok(AnalysisResult::new(inputs, summary, &instance))
    }
}

impl std::fmt::Debug for ProjectContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectContext")
            .field("cache", &self.cache)
            .field("packages", &self.graph.len())
            .finish_non_exhaustive()
    }
}

/// Union of the upstream packages of `files`.
fn upstream_of(files: &[SourceFile], known: &FxHashSet<PackageName>) -> Upstream {
    let mut upstream = Upstream::default();
    for file in files {
        upstream.merge(recompute_upstream(&scan(&file.text), known));
    }
    upstream
}
