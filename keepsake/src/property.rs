//! Cached read-only properties.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use keepsake_core::{BoundArgs, CacheError, CacheGate, CacheResult, HasCache};
use tracing::{trace, warn};

use crate::lookup::{self, Lookup};

/// Getter wrapped by a property.
pub type Getter<H, R, E> = fn(&H) -> Result<R, E>;

/// Compute function wrapped by a method.
pub type MethodFn<H, R, E> = fn(&H, &BoundArgs) -> Result<R, E>;

pub(crate) enum Compute<H, R, E> {
    Getter(Getter<H, R, E>),
    /// A method without parameters promoted to a property.
    Method(MethodFn<H, R, E>),
}

impl<H, R, E> Clone for Compute<H, R, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H, R, E> Copy for Compute<H, R, E> {}

impl<H, R, E> Compute<H, R, E> {
    fn run(&self, host: &H) -> Result<R, E> {
        match self {
            Compute::Getter(getter) => getter(host),
            Compute::Method(method) => method(host, &BoundArgs::empty()),
        }
    }
}

/// A read-only value computed once per host and then served from the
/// host's cache.
///
/// ```ignore
/// static AREA: Lazy<CachedProperty<Rect, f64>> = Lazy::new(|| prop("area", Rect::area));
///
/// let first = AREA.get(&rect)?;
/// let again = AREA.get(&rect)?;
/// assert!(Rc::ptr_eq(&first, &again));
/// ```
pub struct CachedProperty<H, R, E = CacheError> {
    name: Cow<'static, str>,
    key: Option<Cow<'static, str>>,
    doc: Option<Cow<'static, str>>,
    gate: CacheGate,
    compute: Compute<H, R, E>,
}

/// Wrap `getter` as a cached property named `name`.
pub fn prop<H, R, E>(
    name: impl Into<Cow<'static, str>>,
    getter: Getter<H, R, E>,
) -> CachedProperty<H, R, E> {
    CachedProperty::from_compute(name.into(), Compute::Getter(getter))
}

impl<H, R, E> CachedProperty<H, R, E> {
    pub(crate) fn from_compute(name: Cow<'static, str>, compute: Compute<H, R, E>) -> Self {
        Self {
            name,
            key: None,
            doc: None,
            gate: CacheGate::always(),
            compute,
        }
    }

    /// Store under `key` instead of the accessor name.
    pub fn with_key(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<Cow<'static, str>>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Cache only for hosts whose `use_cache` returns true.
    pub fn check_use_cache(mut self, check: bool) -> Self {
        self.gate = CacheGate::new(check);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// The storage key: the explicit key, else the name.
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }

    pub fn gate(&self) -> CacheGate {
        self.gate
    }

    /// Writes are always rejected.
    pub fn set(&self, _host: &H, _value: R) -> CacheResult<()> {
        Err(CacheError::ReadOnly {
            name: self.name.to_string(),
        })
    }
}

impl<H, R, E> CachedProperty<H, R, E>
where
    H: HasCache,
    R: 'static,
    E: From<CacheError>,
{
    /// Read the property, computing and storing it on first access.
    pub fn get(&self, host: &H) -> Result<Rc<R>, E> {
        let key = self.key();
        if !self.gate.is_open(host) {
            trace!(key = %key, "cache gate closed, computing directly");
            return self.compute.run(host).map(Rc::new);
        }

        let cell = host.cache();
        match lookup::value::<R>(cell, key)? {
            Lookup::Hit(value) => {
                trace!(key = %key, "cache hit");
                Ok(value)
            }
            Lookup::Mismatch(found) => {
                warn!(key = %key, found, "cached slot is unusable, computing uncached");
                self.compute.run(host).map(Rc::new)
            }
            Lookup::Vacant => {
                trace!(key = %key, "cache miss");
                let value = Rc::new(self.compute.run(host)?);
                let displaced = lookup::store_value(cell, key, Rc::clone(&value))?;
                drop(displaced);
                Ok(value)
            }
        }
    }

    /// Whether a value is currently stored for this property.
    pub fn is_cached(&self, host: &H) -> bool {
        host.cache().contains(self.key())
    }

    /// Drop this property's stored value, if any.
    pub fn forget(&self, host: &H) -> CacheResult<bool> {
        host.cache().remove(self.key())
    }
}

impl<H, R, E> Clone for CachedProperty<H, R, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            key: self.key.clone(),
            doc: self.doc.clone(),
            gate: self.gate,
            compute: self.compute,
        }
    }
}

impl<H, R, E> fmt::Debug for CachedProperty<H, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedProperty")
            .field("name", &self.name)
            .field("key", &self.key())
            .field("check_use_cache", &self.gate.checks_use_cache())
            .finish()
    }
}
