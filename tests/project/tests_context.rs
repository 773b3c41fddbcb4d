//! Compile orchestration over a workspace on disk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use weft::analysis::{FileAnalyzer, FileInputs};
use weft::base::constants::SOURCE_EXTENSION;
use weft::compile::{DataStatus, SourceCompiler};
use weft::config::Options;
use weft::document::DocumentStore;
use weft::sync::Deadline;
use weft::syntax::codes;
use weft::{PackageName, ProjectContext};

use crate::helpers::analyzers::CountingCompiler;
use crate::helpers::fixtures::{APP, BASE, layered_workspace, write};

fn names(packages: &[&str]) -> Vec<PackageName> {
    packages.iter().map(|p| PackageName::from(*p)).collect()
}

fn loaded(root: PathBuf, compiler: Arc<CountingCompiler>) -> ProjectContext {
    let ctx = ProjectContext::new(Options::default(), compiler);
    let packages = ctx.load(&[root], SOURCE_EXTENSION, true).unwrap();
    assert_eq!(packages, names(&["app", "base", "mid", "other"]));
    ctx
}

#[test]
fn test_load_wires_graph() {
    let dir = layered_workspace();
    let ctx = loaded(dir.path().to_path_buf(), Arc::default());

    assert_eq!(ctx.graph().dependents("base"), names(&["mid", "other"]));
    assert_eq!(ctx.graph().dependencies("app"), names(&["mid"]));
    assert_eq!(ctx.files_of("mid"), vec![dir.path().join("mid.wf")]);
    assert_eq!(
        ctx.package_of(&dir.path().join("other.wf")).as_deref(),
        Some("other")
    );
    assert!(ctx.graph().is_in_module("app"));
}

#[test]
fn test_full_rebuild_compiles_everything_upstream_first() {
    let dir = layered_workspace();
    let compiler = Arc::new(CountingCompiler::default());
    let ctx = loaded(dir.path().to_path_buf(), compiler.clone());

    assert_eq!(ctx.full_rebuild().unwrap(), 4);
    assert_eq!(compiler.compiles.get(), 4);
    for package in ["app", "base", "mid", "other"] {
        assert!(ctx.objects().is_fresh(package), "{package} should be fresh");
        assert!(ctx.cache().has(package));
    }
    let app = ctx.cache().get("app").unwrap();
    assert_eq!(app.resolve("Wrap").map(|s| s.as_str()), Some("mid.Wrap"));
    assert!(!app.has_errors());
}

#[test]
fn test_incremental_rebuild_with_unchanged_object_stops_early() {
    let dir = layered_workspace();
    let compiler = Arc::new(CountingCompiler::default());
    let ctx = loaded(dir.path().to_path_buf(), compiler.clone());
    ctx.full_rebuild().unwrap();

    let rebuilt = ctx.incremental_rebuild("base").unwrap();

    assert_eq!(rebuilt, names(&["base"]));
    assert_eq!(compiler.compiles.get(), 5);
    assert!(ctx.objects().is_fresh("app"));
}

#[test]
fn test_incremental_rebuild_follows_changed_objects_only() {
    let dir = layered_workspace();
    let ctx = loaded(dir.path().to_path_buf(), Arc::default());
    ctx.full_rebuild().unwrap();

    write(dir.path(), "base.wf", "package base\nclass Node {}\nstruct Edge {}\n");
    let rebuilt = ctx.incremental_rebuild("base").unwrap();

    assert_eq!(rebuilt[0].as_str(), "base");
    let mut rest = rebuilt[1..].to_vec();
    rest.sort();
    // mid's own exports did not change, so app keeps its instance.
    assert_eq!(rest, names(&["mid", "other"]));
    assert_eq!(ctx.objects().status("app"), Some(DataStatus::Fresh));
}

#[test]
fn test_compile_package_builds_stale_upstream_lazily() {
    let dir = layered_workspace();
    let compiler = Arc::new(CountingCompiler::default());
    let ctx = loaded(dir.path().to_path_buf(), compiler.clone());

    let app = ctx.compile_package("app").unwrap();
    assert_eq!(compiler.compiles.get(), 3);
    assert!(ctx.objects().is_fresh("base"));
    assert!(ctx.objects().is_fresh("mid"));
    assert!(ctx.objects().get("other").is_none());
    assert_eq!(app.imported.get("Wrap").map(|s| s.as_str()), Some("mid.Wrap"));

    let again = ctx.compile_package("app").unwrap();
    assert!(Arc::ptr_eq(&app, &again));
    assert_eq!(compiler.compiles.get(), 3);
}

#[rstest]
#[case("ghost")]
#[case("")]
fn test_compile_unknown_package_fails(#[case] package: &str) {
    let ctx = ProjectContext::new(Options::default(), Arc::new(SourceCompiler::new()));
    assert!(ctx.compile_package(package).is_err());
}

#[test]
fn test_analyze_prefers_new_text_over_disk() {
    let dir = layered_workspace();
    let ctx = loaded(dir.path().to_path_buf(), Arc::default());
    let app = dir.path().join("app.wf");

    let inputs = FileInputs::new(&app, 3, "package app\nimport mid.Wrap\nimport ghost.Thing\n");
    let result = ctx.analyze(&inputs).unwrap();

    assert_eq!(result.version, 3);
    assert!(!result.degraded);
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.code == Some(codes::UNRESOLVED_IMPORT))
    );
    assert!(ctx.objects().is_fresh("mid"));
    assert!(ctx.objects().is_fresh("base"));
}

#[test]
fn test_analyze_reads_other_files_from_open_documents() {
    let dir = layered_workspace();
    let documents = Arc::new(DocumentStore::new());
    let ctx = ProjectContext::new(Options::default(), Arc::new(SourceCompiler::new()))
        .with_documents(documents.clone());
    ctx.load(&[dir.path().to_path_buf()], SOURCE_EXTENSION, true)
        .unwrap();
    let extra = write(dir.path(), "extra.wf", "package base\n");
    let base = dir.path().join("base.wf");
    documents.add_or_replace(&base, 0, "package base\nclass Node {}\nclass Unsaved {}\n");

    let result = ctx.analyze(&FileInputs::new(&extra, 0, "package base\n")).unwrap();
    assert_eq!(result.package.as_deref(), Some("base"));
    let instance = ctx.cache().get("base").unwrap();
    assert!(instance.symbols.contains_key("Unsaved"));
    assert_eq!(ctx.files_of("base"), vec![base, extra]);
}

#[test]
fn test_analyze_package_rename_migrates_dependents() {
    let dir = layered_workspace();
    let ctx = loaded(dir.path().to_path_buf(), Arc::default());
    ctx.full_rebuild().unwrap();
    let base = dir.path().join("base.wf");

    let renamed = BASE.replace("package base", "package core");
    let result = ctx.analyze(&FileInputs::new(&base, 1, renamed)).unwrap();

    assert_eq!(result.package.as_deref(), Some("core"));
    assert!(!ctx.graph().contains("base"));
    assert!(ctx.objects().get("base").is_none());
    assert!(!ctx.cache().has("base"));
    assert_eq!(ctx.graph().dependents("core"), names(&["mid", "other"]));
    assert_eq!(ctx.package_of(&base).as_deref(), Some("core"));
}

#[test]
fn test_analyze_file_leaving_package_rebuilds_it() {
    let dir = layered_workspace();
    write(dir.path(), "base2.wf", "package base\nstruct Extra {}\n");
    let compiler = Arc::new(CountingCompiler::default());
    let ctx = ProjectContext::new(Options::default(), compiler.clone());
    ctx.load(&[dir.path().to_path_buf()], SOURCE_EXTENSION, true)
        .unwrap();
    ctx.full_rebuild().unwrap();
    assert!(ctx.cache().get("base").unwrap().symbols.contains_key("Extra"));
    let before = compiler.compiles.get();
    let moved = dir.path().join("base2.wf");

    ctx.analyze(&FileInputs::new(&moved, 1, "package mid\nstruct Extra {}\n"))
        .unwrap();

    // base lost a file, so it is compiled again before mid.
    assert_eq!(compiler.compiles.get(), before + 2);
    assert!(!ctx.cache().get("base").unwrap().symbols.contains_key("Extra"));
    assert!(ctx.cache().get("mid").unwrap().symbols.contains_key("Extra"));
    assert_eq!(ctx.files_of("base"), vec![dir.path().join("base.wf")]);
    assert_eq!(ctx.files_of("mid").len(), 2);
}

#[test]
fn test_replaced_instance_is_freed_while_old_result_lives() {
    let dir = layered_workspace();
    let ctx = loaded(dir.path().to_path_buf(), Arc::default());
    let app = dir.path().join("app.wf");

    let first = ctx.analyze(&FileInputs::new(&app, 0, APP)).unwrap();
    let replaced = Arc::downgrade(&ctx.cache().get("app").unwrap());
    let second = ctx
        .analyze(&FileInputs::new(&app, 1, format!("{APP}let v = Wrap\n")))
        .unwrap();

    assert!(ctx.cache().wait_for_reaper(Deadline::after(Duration::from_secs(5))));
    assert!(replaced.upgrade().is_none());
    assert_eq!(first.resolved.get("Wrap").map(|s| s.as_str()), Some("mid.Wrap"));
    assert_eq!(second.version, 1);
}

#[test]
fn test_full_rebuild_flags_open_documents_only() {
    let dir = layered_workspace();
    let documents = Arc::new(DocumentStore::new());
    let ctx = ProjectContext::new(Options::default(), Arc::new(SourceCompiler::new()))
        .with_documents(documents.clone());
    ctx.load(&[dir.path().to_path_buf()], SOURCE_EXTENSION, true)
        .unwrap();
    let base = dir.path().join("base.wf");
    documents.add_or_replace(&base, 0, BASE);

    assert_eq!(ctx.full_rebuild().unwrap(), 4);
    assert!(documents.get(&base).was_initially_compiled);
    assert_eq!(documents.files(), vec![base]);
    assert!(!documents.contains(&dir.path().join("app.wf")));
}
