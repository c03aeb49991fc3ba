//! Per-host cache storage.
//!
//! Every host owns exactly one [`CacheCell`]. The cell holds an optional
//! [`CacheStore`] which is created on first cached access, dropped by
//! [`CacheCell::reset`], and dies with the host. Nothing here is shared
//! between hosts.
//!
//! The cell is a `RefCell`, so a host holding one is `!Sync`. Hosts used
//! from several threads must add their own synchronisation around it.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};
use crate::signature::ParamKey;

/// A cached value. Hits hand out clones of the same `Rc`.
pub type CachedValue = Rc<dyn Any>;

/// Per-call results of one cached method.
pub type CallMap = HashMap<ParamKey, CachedValue>;

/// What a top-level cache key holds.
#[derive(Clone)]
pub enum CacheSlot {
    /// A property, or a method without parameters.
    Value(CachedValue),
    /// A method with parameters, keyed by call.
    Calls(CallMap),
}

impl CacheSlot {
    pub fn as_value(&self) -> Option<&CachedValue> {
        match self {
            CacheSlot::Value(value) => Some(value),
            CacheSlot::Calls(_) => None,
        }
    }

    pub fn as_calls(&self) -> Option<&CallMap> {
        match self {
            CacheSlot::Calls(calls) => Some(calls),
            CacheSlot::Value(_) => None,
        }
    }

    /// Number of cached results under this slot.
    pub fn len(&self) -> usize {
        match self {
            CacheSlot::Value(_) => 1,
            CacheSlot::Calls(calls) => calls.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CacheSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheSlot::Value(_) => f.write_str("Value(..)"),
            CacheSlot::Calls(calls) => {
                let mut keys: Vec<_> = calls.keys().collect();
                keys.sort();
                f.debug_tuple("Calls").field(&keys).finish()
            }
        }
    }
}

/// Cache accounting events recorded by accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    Hit,
    Miss,
    /// The call could not be keyed and ran without the cache.
    Uncacheable,
    Invalidation,
}

/// Statistics about cache usage for one store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of calls that could not be keyed.
    pub uncacheable: u64,
    /// Number of entries removed by invalidation.
    pub invalidations: u64,
    /// Number of cached results currently stored.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Mapping from cache key to cached slot.
#[derive(Debug, Default)]
pub struct CacheStore {
    slots: BTreeMap<String, CacheSlot>,
    stats: CacheStats,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, key: &str) -> Option<&CacheSlot> {
        self.slots.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Store a plain value, returning whatever the key held before.
    pub fn insert_value(
        &mut self,
        key: impl Into<String>,
        value: CachedValue,
    ) -> Option<CacheSlot> {
        self.slots.insert(key.into(), CacheSlot::Value(value))
    }

    /// Per-call map of a method, created empty if the key is vacant.
    ///
    /// Returns `None` when the key already holds a plain value.
    pub fn ensure_calls(&mut self, key: &str) -> Option<&mut CallMap> {
        let slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| CacheSlot::Calls(CallMap::new()));
        match slot {
            CacheSlot::Calls(calls) => Some(calls),
            CacheSlot::Value(_) => None,
        }
    }

    pub fn call(&self, key: &str, params: &ParamKey) -> Option<&CachedValue> {
        self.slots.get(key)?.as_calls()?.get(params)
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheSlot> {
        let removed = self.slots.remove(key);
        if removed.is_some() {
            self.record(CacheEvent::Invalidation);
        }
        removed
    }

    /// Remove every slot, handing them back to the caller.
    pub fn drain(&mut self) -> Vec<CacheSlot> {
        let drained: Vec<CacheSlot> = std::mem::take(&mut self.slots).into_values().collect();
        self.stats.invalidations += drained.len() as u64;
        drained
    }

    pub fn record(&mut self, event: CacheEvent) {
        match event {
            CacheEvent::Hit => self.stats.hits += 1,
            CacheEvent::Miss => self.stats.misses += 1,
            CacheEvent::Uncacheable => self.stats.uncacheable += 1,
            CacheEvent::Invalidation => self.stats.invalidations += 1,
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.slots.values().map(|s| s.len() as u64).sum(),
            ..self.stats.clone()
        }
    }
}

// ============================================================================
// CELL
// ============================================================================

/// Whether a host can hold cache storage at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheLayout {
    /// Storage is created on demand.
    #[default]
    Dynamic,
    /// Fixed-layout host without a storage slot; caching always fails.
    Sealed,
}

/// The cache field of a host.
#[derive(Debug, Default)]
pub struct CacheCell {
    layout: CacheLayout,
    store: RefCell<Option<CacheStore>>,
}

impl CacheCell {
    /// A cell whose store is created on first cached access.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cell with an empty store already in place.
    pub fn declared() -> Self {
        Self {
            layout: CacheLayout::Dynamic,
            store: RefCell::new(Some(CacheStore::new())),
        }
    }

    /// A cell that can never hold a store.
    pub fn sealed() -> Self {
        Self {
            layout: CacheLayout::Sealed,
            store: RefCell::new(None),
        }
    }

    pub fn layout(&self) -> CacheLayout {
        self.layout
    }

    /// Run `f` against the store, creating the store first if needed.
    ///
    /// Fails with [`CacheError::MissingCache`] on a sealed cell and
    /// [`CacheError::Busy`] if the store is already borrowed.
    pub fn with_store<T>(&self, f: impl FnOnce(&mut CacheStore) -> T) -> CacheResult<T> {
        let mut guard = self.store.try_borrow_mut().map_err(|_| CacheError::Busy)?;
        if guard.is_none() {
            if self.layout == CacheLayout::Sealed {
                return Err(CacheError::MissingCache);
            }
            *guard = Some(CacheStore::new());
        }
        match guard.as_mut() {
            Some(store) => Ok(f(store)),
            None => Err(CacheError::MissingCache),
        }
    }

    /// Run `f` against the store if one exists, without creating it.
    pub fn with_existing<T>(&self, f: impl FnOnce(&mut CacheStore) -> T) -> CacheResult<Option<T>> {
        let mut guard = self.store.try_borrow_mut().map_err(|_| CacheError::Busy)?;
        Ok(guard.as_mut().map(f))
    }

    /// Read the store without creating it. A busy store reads as absent.
    pub fn inspect<T>(&self, f: impl FnOnce(Option<&CacheStore>) -> T) -> T {
        match self.store.try_borrow() {
            Ok(guard) => f(guard.as_ref()),
            Err(_) => f(None),
        }
    }

    /// Returns true once a store exists.
    pub fn is_initialized(&self) -> bool {
        self.inspect(|store| store.is_some())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inspect(|store| store.is_some_and(|s| s.contains_key(key)))
    }

    pub fn keys(&self) -> Vec<String> {
        self.inspect(|store| {
            store
                .map(|s| s.keys().map(str::to_string).collect())
                .unwrap_or_default()
        })
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.inspect(|store| store.map_or(0, CacheStore::len))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cached calls under a method key.
    pub fn calls_len(&self, key: &str) -> Option<usize> {
        self.inspect(|store| Some(store?.slot(key)?.as_calls()?.len()))
    }

    /// Cached plain value under `key`, if it has type `T`.
    pub fn value<T: 'static>(&self, key: &str) -> Option<Rc<T>> {
        let value = self.inspect(|store| store?.slot(key)?.as_value().cloned())?;
        value.downcast::<T>().ok()
    }

    /// Cached result of one call, if it has type `T`.
    pub fn call_value<T: 'static>(&self, key: &str, params: &ParamKey) -> Option<Rc<T>> {
        let value = self.inspect(|store| store?.call(key, params).cloned())?;
        value.downcast::<T>().ok()
    }

    pub fn stats(&self) -> Option<CacheStats> {
        self.inspect(|store| store.map(CacheStore::stats))
    }

    /// Remove one top-level entry. Missing keys are ignored.
    pub fn remove(&self, key: &str) -> CacheResult<bool> {
        let removed = self.with_existing(|store| store.remove(key))?.flatten();
        // dropped after the borrow is released
        Ok(removed.is_some())
    }

    /// Remove every entry, keeping the (now empty) store.
    pub fn clear(&self) -> CacheResult<usize> {
        let drained = self.with_existing(CacheStore::drain)?.unwrap_or_default();
        Ok(drained.len())
    }

    /// Drop the store entirely; the next cached access creates a new one.
    pub fn reset(&self) -> CacheResult<bool> {
        let previous = self
            .store
            .try_borrow_mut()
            .map_err(|_| CacheError::Busy)?
            .take();
        Ok(previous.is_some())
    }
}

/// A type that owns a [`CacheCell`] and can therefore host cached accessors.
pub trait HasCache {
    /// The host's cache field.
    fn cache(&self) -> &CacheCell;

    /// Opt-in switch consulted by accessors built with `check_use_cache`.
    fn use_cache(&self) -> bool {
        false
    }
}
