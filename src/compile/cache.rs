//! Bounded LRU cache of compiler instances.
//!
//! Values are owned by the cache and handed out as `Arc` read handles.
//! Whenever the cache lets go of a value (eviction, replacement, erase or a
//! rejected bulk insert) the value is passed to the [`Reaper`] after the lock
//! is released, so a large instance is never torn down on the caller's thread
//! or while other callers wait on the cache.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::instance::CompilerInstance;
use super::reaper::Reaper;
use crate::base::PackageName;
use crate::sync::Deadline;

pub struct InstanceCache<V = CompilerInstance> {
    entries: RwLock<LruCache<PackageName, Arc<V>>>,
    reaper: Reaper,
}

impl<V: Send + Sync + 'static> InstanceCache<V> {
    /// A cache holding at most `capacity` instances (at least one).
    pub fn new(capacity: usize, reaper_threads: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            reaper: Reaper::new(reaper_threads),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.read().cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check for `key` without touching its recency.
    pub fn has(&self, key: &str) -> bool {
        self.entries.read().contains(key)
    }

    /// Cached keys, most recently used first.
    pub fn keys(&self) -> Vec<PackageName> {
        self.entries.read().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Look up `key` and mark it most recently used.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.entries.write().get(key).cloned()
    }

    /// Insert `value` as most recently used.
    ///
    /// A value already stored under `key` is replaced; otherwise, when the
    /// cache is full, the least recently used entry is evicted and its key
    /// returned.
    pub fn set(&self, key: PackageName, value: V) -> Option<PackageName> {
        self.set_shared(key, Arc::new(value))
    }

    /// [`set`](Self::set) for a value the caller keeps a handle to.
    pub fn set_shared(&self, key: PackageName, value: Arc<V>) -> Option<PackageName> {
        let displaced = self.entries.write().push(key.clone(), value);
        let (old_key, old_value) = displaced?;
        self.reaper.dispose(old_value);
        if old_key == key {
            trace!(package = %key, "replaced cached instance");
            None
        } else {
            debug!(evicted = %old_key, inserted = %key, "evicted cached instance");
            Some(old_key)
        }
    }

    /// Insert only while the cache has room, as bulk loading must not evict
    /// instances the editor is using. Replacing an existing key is allowed.
    /// Returns whether the value was cached; a rejected value is reaped.
    pub fn set_if_room_for_bulk_load(&self, key: PackageName, value: Arc<V>) -> bool {
        let displaced = {
            let mut entries = self.entries.write();
            if entries.len() < entries.cap().get() || entries.contains(&key) {
                Ok(entries.push(key, value))
            } else {
                Err(value)
            }
        };
        match displaced {
            Ok(old) => {
                if let Some((_, old_value)) = old {
                    self.reaper.dispose(old_value);
                }
                true
            }
            Err(rejected) => {
                self.reaper.dispose(rejected);
                false
            }
        }
    }

    /// Remove `key`, reaping its value. Returns whether it was present.
    pub fn erase(&self, key: &str) -> bool {
        let removed = self.entries.write().pop(key);
        match removed {
            Some(value) => {
                self.reaper.dispose(value);
                true
            }
            None => false,
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let drained: Vec<_> = {
            let mut entries = self.entries.write();
            std::iter::from_fn(|| entries.pop_lru()).collect()
        };
        for (_, value) in drained {
            self.reaper.dispose(value);
        }
    }

    /// Block until every value released so far has been dropped.
    pub fn wait_for_reaper(&self, deadline: Deadline) -> bool {
        self.reaper.wait_idle(deadline)
    }
}

impl<V> std::fmt::Debug for InstanceCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        f.debug_struct("InstanceCache")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish_non_exhaustive()
    }
}
