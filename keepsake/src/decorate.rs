//! Option-driven construction of cached accessors.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use keepsake_core::{
    AccessorConfig, CacheError, CacheResult, CallArgs, DecorateOptions, HasCache, Signature,
    SignatureError,
};

use crate::method::{meth, CachedMethod};
use crate::property::{CachedProperty, Compute, MethodFn};

/// Builds a property or a method from [`DecorateOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decorator {
    options: DecorateOptions,
}

/// Start decorating with `options`.
pub fn decorate(options: DecorateOptions) -> Decorator {
    Decorator { options }
}

impl Decorator {
    /// Decorator with the options configured for `name`.
    pub fn from_config(config: &AccessorConfig, name: &str) -> Self {
        decorate(config.options_for(name))
    }

    pub fn options(&self) -> &DecorateOptions {
        &self.options
    }

    /// Wrap `compute` according to the options.
    ///
    /// A property may only wrap a function without parameters; anything
    /// else fails with [`SignatureError::PropertyArity`].
    pub fn apply<H, R, E>(
        &self,
        name: impl Into<Cow<'static, str>>,
        signature: Signature,
        compute: MethodFn<H, R, E>,
    ) -> CacheResult<Cached<H, R, E>> {
        self.options.validate()?;
        let name = name.into();

        let cached = if self.options.as_property {
            if !signature.is_empty() {
                return Err(CacheError::from(SignatureError::PropertyArity {
                    name: name.into_owned(),
                    params: signature.len(),
                }));
            }
            let mut property = CachedProperty::from_compute(name, Compute::Method(compute))
                .check_use_cache(self.options.check_use_cache);
            if let Some(key) = &self.options.key {
                property = property.with_key(key.clone());
            }
            Cached::Property(property)
        } else {
            let mut method =
                meth(name, signature, compute).check_use_cache(self.options.check_use_cache);
            if let Some(key) = &self.options.key {
                method = method.with_key(key.clone());
            }
            Cached::Method(method)
        };
        Ok(cached)
    }
}

/// A decorated accessor.
pub enum Cached<H, R, E = CacheError> {
    Property(CachedProperty<H, R, E>),
    Method(CachedMethod<H, R, E>),
}

impl<H, R, E> Clone for Cached<H, R, E> {
    fn clone(&self) -> Self {
        match self {
            Cached::Property(property) => Cached::Property(property.clone()),
            Cached::Method(method) => Cached::Method(method.clone()),
        }
    }
}

impl<H, R, E> fmt::Debug for Cached<H, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cached::Property(property) => f.debug_tuple("Property").field(property).finish(),
            Cached::Method(method) => f.debug_tuple("Method").field(method).finish(),
        }
    }
}

impl<H, R, E> Cached<H, R, E> {
    pub fn name(&self) -> &str {
        match self {
            Cached::Property(property) => property.name(),
            Cached::Method(method) => method.name(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Cached::Property(property) => property.key(),
            Cached::Method(method) => method.key(),
        }
    }

    pub fn as_property(&self) -> Option<&CachedProperty<H, R, E>> {
        match self {
            Cached::Property(property) => Some(property),
            Cached::Method(_) => None,
        }
    }

    pub fn as_method(&self) -> Option<&CachedMethod<H, R, E>> {
        match self {
            Cached::Method(method) => Some(method),
            Cached::Property(_) => None,
        }
    }
}

impl<H, R, E> Cached<H, R, E>
where
    H: HasCache,
    R: 'static,
    E: From<CacheError>,
{
    /// Read or call the accessor. A property accepts no arguments.
    pub fn call(&self, host: &H, args: &CallArgs) -> Result<Rc<R>, E> {
        match self {
            Cached::Property(property) => {
                Signature::empty()
                    .bind(args)
                    .map_err(|err| E::from(CacheError::from(err)))?;
                property.get(host)
            }
            Cached::Method(method) => method.call(host, args),
        }
    }
}
