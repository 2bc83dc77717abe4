//! Object caches backing the caching lifecycles.
//!
//! Entries are keyed by the requested plugin type plus the identity of the
//! instance that built them. Writes never overwrite: when two threads race on
//! the same key, the first stored object wins and both callers get it.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::instance::InstanceId;
use crate::plugin_type::PluginType;
use crate::value::Value;

/// Cache key: requested type and building instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    plugin_type: PluginType,
    instance: InstanceId,
}

impl CacheKey {
    pub fn new(plugin_type: PluginType, instance: InstanceId) -> Self {
        Self { plugin_type, instance }
    }

    pub fn plugin_type(&self) -> &PluginType {
        &self.plugin_type
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }
}

/// Storage for built objects.
pub trait ObjectCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Value>;

    /// Stores `value` unless the key is taken; returns the stored object.
    fn set(&self, key: CacheKey, value: Value) -> Value;

    fn eject(&self, key: &CacheKey);

    /// Drops every entry built for `plugin_type`.
    fn eject_type(&self, plugin_type: &PluginType);

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A cache shared by every thread that can reach it.
///
/// Backs singletons (one per graph), build sessions and nested containers.
#[derive(Default)]
pub struct SharedCache {
    entries: Mutex<AHashMap<CacheKey, Value>>,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectCache for SharedCache {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: CacheKey, value: Value) -> Value {
        self.entries.lock().entry(key).or_insert(value).clone()
    }

    fn eject(&self, key: &CacheKey) {
        self.entries.lock().remove(key);
    }

    fn eject_type(&self, plugin_type: &PluginType) {
        self.entries.lock().retain(|key, _| key.plugin_type != *plugin_type);
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

type ThreadEntries = Arc<Mutex<AHashMap<CacheKey, Value>>>;

static NEXT_THREAD_CACHE: AtomicU64 = AtomicU64::new(0);

thread_local! {
    // This thread's entries of every `ThreadCache` it has written to, keyed
    // by cache id. The strong handles live here, so entries drop with the
    // thread.
    static THREAD_ENTRIES: RefCell<AHashMap<u64, ThreadEntries>> = RefCell::new(AHashMap::new());
}

/// One cache per OS thread.
///
/// Each thread owns its entries; the cache only keeps weak handles to them
/// so it can eject across threads. Objects built for a thread are dropped
/// when that thread exits or when the cache is dropped, whichever is first.
pub struct ThreadCache {
    id: u64,
    threads: Mutex<Vec<Weak<Mutex<AHashMap<CacheKey, Value>>>>>,
}

impl Default for ThreadCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadCache {
    pub fn new() -> Self {
        Self {
            id: NEXT_THREAD_CACHE.fetch_add(1, Ordering::Relaxed),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Entries of the calling thread; `None` once its thread-locals are gone.
    fn current(&self) -> Option<ThreadEntries> {
        THREAD_ENTRIES
            .try_with(|slots| slots.borrow().get(&self.id).cloned())
            .ok()
            .flatten()
    }

    fn current_or_insert(&self) -> Option<ThreadEntries> {
        THREAD_ENTRIES
            .try_with(|slots| {
                if let Some(entries) = slots.borrow().get(&self.id) {
                    return entries.clone();
                }
                let entries = ThreadEntries::default();
                {
                    let mut threads = self.threads.lock();
                    threads.retain(|thread| thread.strong_count() > 0);
                    threads.push(Arc::downgrade(&entries));
                }
                let mut slots = slots.borrow_mut();
                // Slots of dropped caches are already empty.
                slots.retain(|_, entries| Arc::weak_count(entries) > 0);
                slots.insert(self.id, entries.clone());
                entries
            })
            .ok()
    }

    fn live_threads(&self) -> Vec<ThreadEntries> {
        self.threads.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// Threads that currently hold entries.
    pub fn thread_count(&self) -> usize {
        self.threads
            .lock()
            .iter()
            .filter(|thread| thread.strong_count() > 0)
            .count()
    }
}

impl ObjectCache for ThreadCache {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        let entries = self.current()?;
        let hit = entries.lock().get(key).cloned();
        hit
    }

    fn set(&self, key: CacheKey, value: Value) -> Value {
        match self.current_or_insert() {
            Some(entries) => {
                let stored = entries.lock().entry(key).or_insert(value).clone();
                stored
            }
            None => value,
        }
    }

    fn eject(&self, key: &CacheKey) {
        for entries in self.live_threads() {
            entries.lock().remove(key);
        }
    }

    fn eject_type(&self, plugin_type: &PluginType) {
        for entries in self.live_threads() {
            entries.lock().retain(|key, _| key.plugin_type != *plugin_type);
        }
    }

    fn clear(&self) {
        for entries in self.live_threads() {
            entries.lock().clear();
        }
    }

    /// Entries cached for the calling thread.
    fn len(&self) -> usize {
        self.current().map_or(0, |entries| entries.lock().len())
    }
}

impl Drop for ThreadCache {
    fn drop(&mut self) {
        self.clear();
    }
}
