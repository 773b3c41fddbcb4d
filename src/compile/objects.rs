//! Serialized package objects and their freshness.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::base::PackageName;
use crate::graph::DependencyGraph;

/// How far a package object can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataStatus {
    /// Built from the current sources and upstream objects.
    Fresh,
    /// Something further upstream changed; the object is valid unless one of
    /// its direct upstream objects turns out to have changed too.
    WeakStale,
    /// A direct upstream object changed; the package must be rebuilt.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageObject {
    pub data: Option<Arc<[u8]>>,
    pub status: DataStatus,
}

/// Exported package objects, one per compiled package.
#[derive(Debug, Default)]
pub struct PackageObjectStore {
    objects: RwLock<FxHashMap<PackageName, PackageObject>>,
}

impl PackageObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly built object. Returns whether the bytes differ from
    /// the previous object.
    pub fn set(&self, package: PackageName, data: Arc<[u8]>) -> bool {
        let mut objects = self.objects.write();
        let changed = objects
            .get(&package)
            .and_then(|o| o.data.as_deref())
            .is_none_or(|old| *old != *data);
        trace!(%package, changed, "stored package object");
        objects.insert(
            package,
            PackageObject {
                data: Some(data),
                status: DataStatus::Fresh,
            },
        );
        changed
    }

    pub fn get(&self, package: &str) -> Option<Arc<[u8]>> {
        self.objects.read().get(package).and_then(|o| o.data.clone())
    }

    pub fn status(&self, package: &str) -> Option<DataStatus> {
        self.objects.read().get(package).map(|o| o.status)
    }

    /// True when a fresh object exists for `package`.
    pub fn is_fresh(&self, package: &str) -> bool {
        self.objects
            .read()
            .get(package)
            .is_some_and(|o| o.data.is_some() && o.status == DataStatus::Fresh)
    }

    /// Set the status of each package. A `Stale` package is never
    /// downgraded to `WeakStale`.
    pub fn update_status<'a>(
        &self,
        packages: impl IntoIterator<Item = &'a PackageName>,
        status: DataStatus,
    ) {
        let mut objects = self.objects.write();
        for package in packages {
            let object = objects
                .entry(package.clone())
                .or_insert_with(|| PackageObject {
                    data: None,
                    status,
                });
            if !(object.status == DataStatus::Stale && status == DataStatus::WeakStale) {
                object.status = status;
            }
        }
    }

    /// The subset of `packages` without a fresh object, in input order.
    pub fn check_status<'a>(
        &self,
        packages: impl IntoIterator<Item = &'a PackageName>,
    ) -> Vec<PackageName> {
        let objects = self.objects.read();
        packages
            .into_iter()
            .filter(|p| {
                !objects
                    .get(p.as_str())
                    .is_some_and(|o| o.data.is_some() && o.status == DataStatus::Fresh)
            })
            .cloned()
            .collect()
    }

    /// Mark the packages depending on `package` after its object changed:
    /// direct dependents become `Stale`, transitive ones `WeakStale`.
    pub fn invalidate_downstream(&self, package: &str, graph: &DependencyGraph) {
        let direct = graph.dependents(package);
        let transitive: Vec<_> = graph
            .find_all_dependents(package)
            .into_iter()
            .filter(|p| !direct.contains(p))
            .collect();
        self.update_status(&direct, DataStatus::Stale);
        self.update_status(&transitive, DataStatus::WeakStale);
    }

    pub fn remove(&self, package: &str) -> Option<PackageObject> {
        self.objects.write().remove(package)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
