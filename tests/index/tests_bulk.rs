//! Bulk indexing of declaration packages, with and without a shard cache.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use weft::compile::SourceCompiler;
use weft::config::Options;
use weft::index::{BulkIndexer, IndexError, IndexShard, ShardStorage};
use weft::syntax::DeclKind;
use weft::{PackageCompiler, ProjectContext};

use crate::helpers::analyzers::CountingCompiler;
use crate::helpers::fixtures::{SDK_CORE, SDK_IO, workspace};

fn declarations() -> TempDir {
    workspace(&[("core/core.d", SDK_CORE), ("io/io.d", SDK_IO), ("README.wf", "package ignored\n")])
}

fn options(root: &Path, cache: Option<&Path>) -> Options {
    let options = Options::default()
        .with_declaration_root(root)
        .with_index_threads(2);
    match cache {
        Some(cache) => options.with_cache_dir(cache),
        None => options,
    }
}

fn indexer(options: Options, compiler: Arc<dyn PackageCompiler>) -> BulkIndexer {
    BulkIndexer::new(Arc::new(ProjectContext::new(options, compiler)))
}

#[test]
fn test_build_indexes_every_declaration_package() {
    let decls = declarations();
    let cache = TempDir::new().unwrap();
    let indexer = indexer(
        options(decls.path(), Some(cache.path())),
        Arc::new(SourceCompiler::new()),
    );

    let report = indexer.build().unwrap();

    assert_eq!(report.packages, 2);
    assert_eq!(report.compiled, 2);
    assert!(!report.from_cache);
    assert!(report.failed.is_empty());
    assert!(report.digest.is_some());
    assert!(!indexer.is_indexing());

    let stream = indexer.symbol_declaration("sdk.io", "sdk.io.Stream").unwrap();
    assert_eq!(stream.kind, DeclKind::Class);
    assert_eq!(stream.file, decls.path().join("io/io.d"));
    assert!(indexer.symbol_declaration("sdk.io", "sdk.io.Missing").is_none());
    assert!(indexer.symbol_declaration("ignored", "ignored.Anything").is_none());
    assert_eq!(indexer.symbols_of("sdk.core").len(), 2);

    let storage = indexer.storage().unwrap();
    assert!(storage.is_valid());
    assert_eq!(storage.shard_files().unwrap().len(), 2);
}

#[test]
fn test_upstream_packages_are_indexed_first() {
    let decls = declarations();
    let cache = TempDir::new().unwrap();
    let bulk = indexer(
        options(decls.path(), Some(cache.path())),
        Arc::new(SourceCompiler::new()),
    );
    bulk.build().unwrap();

    let storage = ShardStorage::new(cache.path());
    let io: IndexShard = storage.read_shard(&storage.shard_path("sdk.io")).unwrap();
    assert!(io.refs.iter().any(|r| r.target == "sdk.core.Object"));
    assert!(
        io.relations
            .iter()
            .any(|r| r.subtype == "sdk.io.Stream" && r.supertype == "sdk.core.Object")
    );
}

#[test]
fn test_build_without_cache_dir_compiles_every_time() {
    let decls = declarations();
    let compiler = Arc::new(CountingCompiler::default());
    let bulk = indexer(options(decls.path(), None), compiler.clone());

    assert!(bulk.storage().is_none());
    assert!(bulk.build().unwrap().digest.is_none());
    bulk.build().unwrap();
    assert_eq!(compiler.compiles.get(), 4);
    assert_eq!(bulk.indexed_packages().len(), 2);
}

#[test]
fn test_valid_cache_skips_compiling() {
    let decls = declarations();
    let cache = TempDir::new().unwrap();
    let first = indexer(
        options(decls.path(), Some(cache.path())),
        Arc::new(SourceCompiler::new()),
    );
    let digest = first.build().unwrap().digest;

    let compiler = Arc::new(CountingCompiler::default());
    let second = indexer(options(decls.path(), Some(cache.path())), compiler.clone());
    let report = second.build().unwrap();

    assert!(report.from_cache);
    assert_eq!(report.compiled, 0);
    assert_eq!(compiler.compiles.get(), 0);
    assert!(report.digest.is_none());
    assert_eq!(ShardStorage::new(cache.path()).digest().ok(), digest);
    assert!(second.symbol_declaration("sdk.core", "sdk.core.Hashable").is_some());
}

#[test]
fn test_tampered_shard_forces_rebuild() {
    let decls = declarations();
    let cache = TempDir::new().unwrap();
    indexer(
        options(decls.path(), Some(cache.path())),
        Arc::new(SourceCompiler::new()),
    )
    .build()
    .unwrap();

    let shard = ShardStorage::new(cache.path()).shard_path("sdk.core");
    let mut bytes = fs::read(&shard).unwrap();
    bytes.push(b'\n');
    fs::write(&shard, bytes).unwrap();

    let compiler = Arc::new(CountingCompiler::default());
    let report = indexer(options(decls.path(), Some(cache.path())), compiler.clone())
        .build()
        .unwrap();

    assert!(!report.from_cache);
    assert_eq!(compiler.compiles.get(), 2);
    assert!(ShardStorage::new(cache.path()).is_valid());
}

#[test]
fn test_concurrent_build_is_rejected() {
    let decls = declarations();
    let compiler = Arc::new(CountingCompiler::gated());
    let indexer = Arc::new(indexer(options(decls.path(), None), compiler.clone()));

    let running = std::thread::spawn({
        let indexer = Arc::clone(&indexer);
        move || indexer.build()
    });
    assert!(compiler.compiles.wait_for(1));
    assert!(indexer.is_indexing());
    assert!(matches!(indexer.build(), Err(IndexError::Busy)));

    compiler.gate.open();
    let report = running.join().unwrap().unwrap();
    assert_eq!(report.compiled, 2);
    assert!(!indexer.is_indexing());
}

#[test]
fn test_missing_root_indexes_nothing() {
    let cache = TempDir::new().unwrap();
    let indexer = indexer(
        options(&cache.path().join("absent"), None),
        Arc::new(SourceCompiler::new()),
    );
    let report = indexer.build().unwrap();
    assert_eq!(report.packages, 0);
    assert!(indexer.indexed_packages().is_empty());
}
