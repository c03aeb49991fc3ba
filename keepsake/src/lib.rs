//! keepsake - Per-Instance Memoization
//!
//! Cached accessors whose results live in a cache owned by each host
//! value, never in a shared or global table:
//!
//! - [`prop`]: a read-only value computed on first access.
//! - [`meth`]: a method cached per distinct call, keyed by its arguments
//!   after binding them to a declared [`Signature`].
//! - [`decorate`]: build either of the above from [`DecorateOptions`].
//! - [`clear_all`] / [`clear_keys`]: purge the cache before a mutation.
//!
//! Accessors are plain values, usually held in `Lazy` statics next to the
//! host type:
//!
//! ```ignore
//! use keepsake::{impl_has_cache, prop, CacheCell, CachedProperty};
//! use once_cell::sync::Lazy;
//!
//! struct Rect { w: f64, h: f64, cache: CacheCell }
//! impl_has_cache!(Rect, cache);
//!
//! impl Rect {
//!     fn compute_area(&self) -> keepsake::CacheResult<f64> {
//!         Ok(self.w * self.h)
//!     }
//! }
//!
//! static AREA: Lazy<CachedProperty<Rect, f64>> = Lazy::new(|| prop("area", Rect::compute_area));
//! ```
//!
//! Hosts are single-threaded: the cache cell is a `RefCell`.

mod lookup;
mod macros;

pub mod decorate;
pub mod invalidate;
pub mod method;
pub mod property;

pub use decorate::{decorate, Cached, Decorator};
pub use invalidate::{clear_all, clear_keys, CacheInvalidator};
pub use method::{meth, CachedMethod};
pub use property::{prop, CachedProperty, Getter, MethodFn};

// Re-export core types so hosts need a single dependency.
pub use keepsake_core::{
    AccessorConfig, ArgValue, BindError, BoundArgs, CacheCell, CacheError, CacheEvent, CacheGate,
    CacheLayout, CacheResult, CacheSlot, CacheStats, CacheStore, CallArgs, ConfigError,
    DecorateOptions, FromArgValue, HasCache, KeyAtom, Param, ParamKey, ParamKind, Signature,
    SignatureError,
};
