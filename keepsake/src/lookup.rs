//! Store access shared by the property and method accessors.
//!
//! Every helper takes the store borrow for the duration of one closure and
//! never while user code runs. Values displaced by a write are returned out
//! of the closure and dropped after the borrow ends.

use std::rc::Rc;

use keepsake_core::{CacheCell, CacheEvent, CacheResult, CacheSlot, CachedValue, ParamKey};

/// Outcome of looking up a cached result.
pub(crate) enum Lookup<R> {
    Hit(Rc<R>),
    Vacant,
    /// The key holds something this accessor cannot use.
    Mismatch(&'static str),
}

/// Look up a plain value, recording the hit or miss.
pub(crate) fn value<R: 'static>(cell: &CacheCell, key: &str) -> CacheResult<Lookup<R>> {
    cell.with_store(|store| {
        let found = match store.slot(key) {
            None => Lookup::Vacant,
            Some(CacheSlot::Calls(_)) => Lookup::Mismatch("per-call map"),
            Some(CacheSlot::Value(value)) => match Rc::clone(value).downcast::<R>() {
                Ok(value) => Lookup::Hit(value),
                Err(_) => Lookup::Mismatch("value of another type"),
            },
        };
        store.record(event_for(&found));
        found
    })
}

pub(crate) fn store_value<R: 'static>(
    cell: &CacheCell,
    key: &str,
    value: Rc<R>,
) -> CacheResult<Option<CacheSlot>> {
    cell.with_store(|store| store.insert_value(key, value))
}

/// Make sure `key` holds a per-call map. Returns false if it holds a value.
pub(crate) fn ensure_calls(cell: &CacheCell, key: &str) -> CacheResult<bool> {
    cell.with_store(|store| store.ensure_calls(key).is_some())
}

/// Look up one call, recording the hit or miss.
pub(crate) fn call<R: 'static>(
    cell: &CacheCell,
    key: &str,
    params: &ParamKey,
) -> CacheResult<Lookup<R>> {
    cell.with_store(|store| {
        let found = match store.slot(key) {
            // cleared since the map was created
            None => Lookup::Vacant,
            Some(CacheSlot::Value(_)) => Lookup::Mismatch("plain value"),
            Some(CacheSlot::Calls(calls)) => match calls.get(params) {
                None => Lookup::Vacant,
                Some(value) => match Rc::clone(value).downcast::<R>() {
                    Ok(value) => Lookup::Hit(value),
                    Err(_) => Lookup::Mismatch("value of another type"),
                },
            },
        };
        store.record(event_for(&found));
        found
    })
}

/// Store one call result, recreating the per-call map if it was cleared.
///
/// Returns `Ok(None)` without storing if the key now holds a plain value.
pub(crate) fn store_call<R: 'static>(
    cell: &CacheCell,
    key: &str,
    params: ParamKey,
    value: Rc<R>,
) -> CacheResult<Option<Option<CachedValue>>> {
    cell.with_store(|store| {
        store
            .ensure_calls(key)
            .map(|calls| calls.insert(params, value))
    })
}

pub(crate) fn record(cell: &CacheCell, event: CacheEvent) -> CacheResult<()> {
    cell.with_store(|store| store.record(event))
}

fn event_for<R>(found: &Lookup<R>) -> CacheEvent {
    match found {
        Lookup::Hit(_) => CacheEvent::Hit,
        Lookup::Vacant => CacheEvent::Miss,
        Lookup::Mismatch(_) => CacheEvent::Uncacheable,
    }
}
