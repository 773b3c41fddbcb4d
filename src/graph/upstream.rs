//! Resolving a file's imports to upstream packages.

use indexmap::IndexSet;
use rustc_hash::FxHashSet;

use crate::base::PackageName;
use crate::syntax::{ImportDecl, SourceSummary};

/// Packages a file imports, split into those the module knows about and
/// the imports that matched nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upstream {
    pub resolved: IndexSet<PackageName>,
    pub unresolved: Vec<ImportDecl>,
}

impl Upstream {
    /// Fold another file's upstream set into this one.
    pub fn merge(&mut self, other: Upstream) {
        self.resolved.extend(other.resolved);
        self.unresolved.extend(other.unresolved);
    }
}

/// Derive the upstream packages of `summary` from its imports.
///
/// Each imported path picks its most specific candidate package found in
/// `module_deps`. Imports of the file's own package resolve without adding
/// an edge.
pub fn recompute_upstream(summary: &SourceSummary, module_deps: &FxHashSet<PackageName>) -> Upstream {
    let own = summary.package.as_ref();
    let mut upstream = Upstream::default();
    for import in &summary.imports {
        let mut all_found = true;
        for candidates in import.spec.package_candidates() {
            let found = candidates
                .iter()
                .find(|c| own == Some(*c) || module_deps.contains(c.as_str()));
            match found {
                Some(package) if own != Some(package) => {
                    upstream.resolved.insert(package.clone());
                }
                Some(_) => {}
                None => all_found = false,
            }
        }
        if !all_found {
            upstream.unresolved.push(import.clone());
        }
    }
    upstream
}
