//! Discovering source files and grouping them into packages.
//!
//! A file belongs to the package its `package` declaration names, or to
//! the default package when it has none.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::base::PackageName;
use crate::base::constants::DEFAULT_PACKAGE;
use crate::compile::{CompileError, SourceFile};
use crate::syntax::scan;

/// Every file under `roots` with the given extension, sorted.
///
/// Unreadable directory entries are skipped with a warning.
pub fn collect_files(roots: &[PathBuf], extension: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in roots {
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(root = %root.display(), %err, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|e| e == extension) {
                files.push(path.to_path_buf());
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

/// Read one source file.
pub fn read_source(path: &Path) -> Result<SourceFile, CompileError> {
    let text = fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
    Ok(SourceFile::new(path, text))
}

/// The package a source text declares.
pub fn package_of(text: &str) -> PackageName {
    scan(text)
        .package
        .unwrap_or_else(|| PackageName::from(DEFAULT_PACKAGE))
}

/// Read every file under `roots` and group the files by package.
///
/// Packages come out sorted by name, files sorted by path.
pub fn load_packages(
    roots: &[PathBuf],
    extension: &str,
) -> Result<IndexMap<PackageName, Vec<SourceFile>>, CompileError> {
    let mut packages: IndexMap<PackageName, Vec<SourceFile>> = IndexMap::new();
    for path in collect_files(roots, extension) {
        let source = read_source(&path)?;
        packages
            .entry(package_of(&source.text))
            .or_default()
            .push(source);
    }
    packages.sort_keys();
    debug!(packages = packages.len(), "loaded sources");
    Ok(packages)
}
