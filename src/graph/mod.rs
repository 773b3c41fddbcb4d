//! Inter-package dependency graph.
//!
//! Each tracked package records the packages it imports (upstream) and the
//! packages importing it (downstream). The two directions are kept exact
//! inverses of each other, restricted to tracked packages, and one
//! `RwLock` guards the whole graph so readers never observe a half-applied
//! update.

mod upstream;

use std::collections::VecDeque;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::base::PackageName;

pub use upstream::{Upstream, recompute_upstream};

/// Dependency edges of one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphEntry {
    pub import_packages: FxHashSet<PackageName>,
    pub downstream_pkgs: FxHashSet<PackageName>,
    /// Number of tracked packages this package imports.
    pub in_degree: usize,
    /// Whether the package belongs to the workspace being edited, as opposed
    /// to a prebuilt dependency.
    pub is_in_module: bool,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    entries: RwLock<FxHashMap<PackageName, GraphEntry>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `package`. Existing edges are kept.
    pub fn add_package(&self, package: PackageName, is_in_module: bool) {
        let mut entries = self.entries.write();
        entries.entry(package).or_default().is_in_module = is_in_module;
    }

    /// Stop tracking `package`, removing its edges in both directions.
    pub fn remove_package(&self, package: &str) -> Option<GraphEntry> {
        let mut entries = self.entries.write();
        let removed = entries.remove(package)?;
        for upstream in &removed.import_packages {
            if let Some(entry) = entries.get_mut(upstream) {
                entry.downstream_pkgs.remove(package);
            }
        }
        for downstream in &removed.downstream_pkgs {
            if let Some(entry) = entries.get_mut(downstream)
                && entry.import_packages.remove(package)
            {
                entry.in_degree = entry.import_packages.len();
            }
        }
        debug!(package, "removed package from dependency graph");
        Some(removed)
    }

    /// Replace the upstream edges of `package`.
    ///
    /// When the package was previously known as `previous_identity`, the
    /// packages that imported the old name are carried over to the new one.
    /// Upstream packages the graph does not track are dropped. A package not
    /// yet tracked is added as part of the module.
    pub fn update_edges(
        &self,
        package: &PackageName,
        upstream: impl IntoIterator<Item = PackageName>,
        previous_identity: Option<&PackageName>,
    ) {
        let mut entries = self.entries.write();

        if let Some(entry) = entries.get(package) {
            let old_imports: Vec<_> = entry.import_packages.iter().cloned().collect();
            for old in old_imports {
                if let Some(upstream) = entries.get_mut(&old) {
                    upstream.downstream_pkgs.remove(package);
                }
            }
        }

        if let Some(previous) = previous_identity.filter(|p| *p != package)
            && let Some(old) = entries.remove(previous)
        {
            trace!(%previous, %package, "migrating downstream edges");
            for upstream in &old.import_packages {
                if let Some(entry) = entries.get_mut(upstream) {
                    entry.downstream_pkgs.remove(previous);
                }
            }
            for downstream in old.downstream_pkgs.iter().filter(|d| *d != package) {
                if let Some(entry) = entries.get_mut(downstream)
                    && entry.import_packages.remove(previous)
                {
                    entry.import_packages.insert(package.clone());
                }
            }
            let entry = entries.entry(package.clone()).or_default();
            entry.is_in_module |= old.is_in_module;
            entry
                .downstream_pkgs
                .extend(old.downstream_pkgs.into_iter().filter(|d| d != package));
        }

        let mut imports = FxHashSet::default();
        for upstream in upstream {
            if upstream == *package {
                continue;
            }
            if entries.contains_key(&upstream) {
                imports.insert(upstream);
            } else {
                trace!(%package, %upstream, "dropping edge to untracked package");
            }
        }
        for upstream in &imports {
            if let Some(entry) = entries.get_mut(upstream) {
                entry.downstream_pkgs.insert(package.clone());
            }
        }

        let entry = entries.entry(package.clone()).or_insert_with(|| GraphEntry {
            is_in_module: true,
            ..GraphEntry::default()
        });
        entry.in_degree = imports.len();
        entry.import_packages = imports;
    }

    pub fn contains(&self, package: &str) -> bool {
        self.entries.read().contains_key(package)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every tracked package, sorted by name.
    pub fn packages(&self) -> Vec<PackageName> {
        let mut packages: Vec<_> = self.entries.read().keys().cloned().collect();
        packages.sort();
        packages
    }

    pub fn entry(&self, package: &str) -> Option<GraphEntry> {
        self.entries.read().get(package).cloned()
    }

    pub fn is_in_module(&self, package: &str) -> bool {
        self.entries
            .read()
            .get(package)
            .is_some_and(|e| e.is_in_module)
    }

    /// Packages `package` imports directly, sorted.
    pub fn dependencies(&self, package: &str) -> Vec<PackageName> {
        self.direct(package, |e| &e.import_packages)
    }

    /// Packages importing `package` directly, sorted.
    pub fn dependents(&self, package: &str) -> Vec<PackageName> {
        self.direct(package, |e| &e.downstream_pkgs)
    }

    fn direct(
        &self,
        package: &str,
        edges: impl Fn(&GraphEntry) -> &FxHashSet<PackageName>,
    ) -> Vec<PackageName> {
        let entries = self.entries.read();
        let mut found: Vec<_> = entries
            .get(package)
            .map(|e| edges(e).iter().cloned().collect())
            .unwrap_or_default();
        found.sort();
        found
    }

    /// Everything `package` imports, directly or transitively.
    pub fn find_all_dependencies(&self, package: &str) -> FxHashSet<PackageName> {
        let entries = self.entries.read();
        closure(&entries, package, |e| &e.import_packages)
    }

    /// Everything importing `package`, directly or transitively.
    pub fn find_all_dependents(&self, package: &str) -> FxHashSet<PackageName> {
        let entries = self.entries.read();
        closure(&entries, package, |e| &e.downstream_pkgs)
    }

    /// Module packages ordered so that every package follows its imports.
    ///
    /// Packages caught in an import cycle cannot be ordered; they are left
    /// out and logged.
    pub fn topological_order(&self) -> Vec<PackageName> {
        let entries = self.entries.read();
        let members: FxHashSet<&PackageName> = entries
            .iter()
            .filter(|(_, e)| e.is_in_module)
            .map(|(name, _)| name)
            .collect();
        let order = kahn(&entries, &members, None);
        if order.len() < members.len() {
            let mut cyclic: Vec<_> = members
                .iter()
                .filter(|m| !order.contains(**m))
                .map(|m| m.as_str())
                .collect();
            cyclic.sort_unstable();
            warn!(packages = ?cyclic, "import cycle, packages left out of build order");
        }
        order
    }

    /// The order in which `package` and everything depending on it must be
    /// rebuilt after `package` changes, starting with `package` itself.
    pub fn incremental_order(&self, package: &str) -> Vec<PackageName> {
        let entries = self.entries.read();
        let Some((root, _)) = entries.get_key_value(package) else {
            return Vec::new();
        };
        let dependents = closure(&entries, package, |e| &e.downstream_pkgs);
        let mut members: FxHashSet<&PackageName> = dependents
            .iter()
            .filter_map(|d| entries.get_key_value(d).map(|(k, _)| k))
            .collect();
        members.insert(root);
        let order = kahn(&entries, &members, Some(root));
        if order.len() < members.len() {
            warn!(package, "import cycle below package, incremental order is partial");
        }
        order
    }

    /// Import cycles found by a depth-first walk, each listed from the
    /// package where the walk entered it.
    pub fn find_cycles(&self) -> Vec<Vec<PackageName>> {
        let entries = self.entries.read();
        let mut names: Vec<_> = entries.keys().collect();
        names.sort();

        let mut state: FxHashMap<&PackageName, Visit> = FxHashMap::default();
        let mut cycles = Vec::new();
        for name in names {
            if !state.contains_key(name) {
                let mut stack = Vec::new();
                visit(&entries, name, &mut state, &mut stack, &mut cycles);
            }
        }
        cycles
    }

    /// A consistent copy of every entry.
    pub fn snapshot(&self) -> FxHashMap<PackageName, GraphEntry> {
        self.entries.read().clone()
    }
}

fn closure(
    entries: &FxHashMap<PackageName, GraphEntry>,
    start: &str,
    edges: impl Fn(&GraphEntry) -> &FxHashSet<PackageName>,
) -> FxHashSet<PackageName> {
    let mut seen = FxHashSet::default();
    let mut queue: VecDeque<&str> = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        let Some(entry) = entries.get(current) else {
            continue;
        };
        for next in edges(entry) {
            if next != start && seen.insert(next.clone()) {
                queue.push_back(next.as_str());
            }
        }
    }
    seen
}

/// Kahn's algorithm over `members`, counting only edges between members.
/// With `root`, the walk starts there regardless of its in-degree.
fn kahn(
    entries: &FxHashMap<PackageName, GraphEntry>,
    members: &FxHashSet<&PackageName>,
    root: Option<&PackageName>,
) -> Vec<PackageName> {
    let mut in_degree: FxHashMap<&PackageName, usize> = members
        .iter()
        .map(|m| {
            let degree = entries[*m]
                .import_packages
                .iter()
                .filter(|u| members.contains(u))
                .count();
            (*m, degree)
        })
        .collect();

    let mut ready: Vec<&PackageName> = match root {
        Some(root) => vec![root],
        None => {
            let mut ready: Vec<_> = in_degree
                .iter()
                .filter(|(_, d)| **d == 0)
                .map(|(m, _)| *m)
                .collect();
            ready.sort();
            ready
        }
    };
    if let Some(root) = root {
        in_degree.insert(root, 0);
    }

    let mut queue: VecDeque<&PackageName> = ready.drain(..).collect();
    let mut order = Vec::with_capacity(members.len());
    let mut emitted: FxHashSet<&PackageName> = FxHashSet::default();
    while let Some(current) = queue.pop_front() {
        if !emitted.insert(current) {
            continue;
        }
        order.push(current.clone());
        let mut next: Vec<&PackageName> = entries[current]
            .downstream_pkgs
            .iter()
            .filter(|d| members.contains(d))
            .collect();
        next.sort();
        for downstream in next {
            if let Some(degree) = in_degree.get_mut(downstream)
                && *degree > 0
            {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(downstream);
                }
            }
        }
    }
    order
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

fn visit<'a>(
    entries: &'a FxHashMap<PackageName, GraphEntry>,
    name: &'a PackageName,
    state: &mut FxHashMap<&'a PackageName, Visit>,
    stack: &mut Vec<&'a PackageName>,
    cycles: &mut Vec<Vec<PackageName>>,
) {
    state.insert(name, Visit::InProgress);
    stack.push(name);
    if let Some(entry) = entries.get(name) {
        let mut imports: Vec<_> = entry.import_packages.iter().collect();
        imports.sort();
        for next in imports {
            let Some((next, _)) = entries.get_key_value(next) else {
                continue;
            };
            match state.get(next) {
                None => visit(entries, next, state, stack, cycles),
                Some(Visit::InProgress) => {
                    if let Some(start) = stack.iter().position(|s| *s == next) {
                        cycles.push(stack[start..].iter().map(|s| (*s).clone()).collect());
                    }
                }
                Some(Visit::Done) => {}
            }
        }
    }
    stack.pop();
    state.insert(name, Visit::Done);
}
