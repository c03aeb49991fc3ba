//! Cached methods keyed by their effective arguments.
//!
//! A method with parameters keeps one nested map under its key, holding a
//! result per distinct call. Calls are bound to the declared [`Signature`]
//! before keying, so `f(3, y=4)`, `f(x=3, y=4)` and `f(3)` with a default
//! `y = 4` all land on the same entry.
//!
//! Calls that cannot be keyed (a list or map argument) run uncached. So do
//! calls whose key holds a plain value instead of a nested map.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use keepsake_core::{
    CacheError, CacheEvent, CacheGate, CacheResult, CallArgs, HasCache, ParamKey, Signature,
};
use tracing::{debug, trace, warn};

use crate::lookup::{self, Lookup};
use crate::property::MethodFn;

/// A method whose results are cached per host and per call.
pub struct CachedMethod<H, R, E = CacheError> {
    name: Cow<'static, str>,
    key: Option<Cow<'static, str>>,
    doc: Option<Cow<'static, str>>,
    gate: CacheGate,
    signature: Signature,
    compute: MethodFn<H, R, E>,
}

/// Wrap `compute` as a cached method named `name` taking `signature`.
pub fn meth<H, R, E>(
    name: impl Into<Cow<'static, str>>,
    signature: Signature,
    compute: MethodFn<H, R, E>,
) -> CachedMethod<H, R, E> {
    CachedMethod {
        name: name.into(),
        key: None,
        doc: None,
        gate: CacheGate::always(),
        signature,
        compute,
    }
}

impl<H, R, E> CachedMethod<H, R, E> {
    pub fn with_key(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<Cow<'static, str>>) -> Self {
        self.doc = Some(doc.into());
        self
    }

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

    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn gate(&self) -> CacheGate {
        self.gate
    }
}

impl<H, R, E> CachedMethod<H, R, E>
where
    H: HasCache,
    R: 'static,
    E: From<CacheError>,
{
    /// Call the method, serving repeated calls from the host's cache.
    ///
    /// Binding errors are returned as [`CacheError::Bind`]. Errors from the
    /// wrapped function are returned unchanged and never cached.
    pub fn call(&self, host: &H, args: &CallArgs) -> Result<Rc<R>, E> {
        let bound = self
            .signature
            .bind(args)
            .map_err(|err| E::from(CacheError::from(err)))?;
        let key = self.key();

        if !self.gate.is_open(host) {
            trace!(key = %key, "cache gate closed, computing directly");
            return (self.compute)(host, &bound).map(Rc::new);
        }

        let cell = host.cache();
        if self.signature.is_empty() {
            return match lookup::value::<R>(cell, key)? {
                Lookup::Hit(value) => {
                    trace!(key = %key, "cache hit");
                    Ok(value)
                }
                Lookup::Mismatch(found) => {
                    warn!(key = %key, found, "cached slot is unusable, computing uncached");
                    (self.compute)(host, &bound).map(Rc::new)
                }
                Lookup::Vacant => {
                    trace!(key = %key, "cache miss");
                    let value = Rc::new((self.compute)(host, &bound)?);
                    drop(lookup::store_value(cell, key, Rc::clone(&value))?);
                    Ok(value)
                }
            };
        }

        if !lookup::ensure_calls(cell, key)? {
            warn!(key = %key, "key holds a plain value, computing uncached");
            lookup::record(cell, CacheEvent::Uncacheable)?;
            return (self.compute)(host, &bound).map(Rc::new);
        }

        let params = match bound.param_key() {
            Ok(params) => params,
            Err(err) => {
                debug!(key = %key, error = %err, "call cannot be keyed, computing uncached");
                lookup::record(cell, CacheEvent::Uncacheable)?;
                return (self.compute)(host, &bound).map(Rc::new);
            }
        };

        match lookup::call::<R>(cell, key, &params)? {
            Lookup::Hit(value) => {
                trace!(key = %key, params = %params, "cache hit");
                Ok(value)
            }
            Lookup::Mismatch(found) => {
                warn!(
                    key = %key,
                    params = %params,
                    found,
                    "cached entry is unusable, computing uncached"
                );
                (self.compute)(host, &bound).map(Rc::new)
            }
            Lookup::Vacant => {
                trace!(key = %key, params = %params, "cache miss");
                let value = Rc::new((self.compute)(host, &bound)?);
                match lookup::store_call(cell, key, params, Rc::clone(&value))? {
                    Some(displaced) => drop(displaced),
                    None => {
                        warn!(key = %key, "key now holds a plain value, result not stored")
                    }
                }
                Ok(value)
            }
        }
    }

    /// Call with no arguments.
    pub fn call_no_args(&self, host: &H) -> Result<Rc<R>, E> {
        self.call(host, &CallArgs::new())
    }

    /// Number of distinct calls cached for `host`.
    pub fn cached_calls(&self, host: &H) -> usize {
        let cell = host.cache();
        if self.signature.is_empty() {
            usize::from(cell.contains(self.key()))
        } else {
            cell.calls_len(self.key()).unwrap_or(0)
        }
    }

    /// Whether the result of `args` is currently stored.
    pub fn is_cached(&self, host: &H, args: &CallArgs) -> CacheResult<bool> {
        let cell = host.cache();
        if self.signature.is_empty() {
            self.signature.bind(args)?;
            return Ok(cell.contains(self.key()));
        }
        let params: ParamKey = match self.signature.bind(args)?.param_key() {
            Ok(params) => params,
            Err(CacheError::Unhashable { .. }) => return Ok(false),
            Err(err) => return Err(err),
        };
        Ok(cell.inspect(|store| {
            store
                .and_then(|s| s.call(self.key(), &params))
                .is_some()
        }))
    }
}

impl<H, R, E> Clone for CachedMethod<H, R, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            key: self.key.clone(),
            doc: self.doc.clone(),
            gate: self.gate,
            signature: self.signature.clone(),
            compute: self.compute,
        }
    }
}

impl<H, R, E> fmt::Debug for CachedMethod<H, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedMethod")
            .field("name", &self.name)
            .field("key", &self.key())
            .field("params", &self.signature.len())
            .field("check_use_cache", &self.gate.checks_use_cache())
            .finish()
    }
}
