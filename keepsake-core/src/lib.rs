//! keepsake Core - Data Types
//!
//! Pure data structures for per-instance memoization: argument values,
//! signatures and call keys, the per-host cache cell, the opt-in gate, and
//! accessor configuration. The accessors themselves live in `keepsake`.

pub mod config;
pub mod error;
pub mod gate;
pub mod signature;
pub mod store;
pub mod value;

pub use config::{AccessorConfig, DecorateOptions, CONFIG_ENV_VAR};
pub use error::{BindError, CacheError, CacheResult, ConfigError, SignatureError};
pub use gate::CacheGate;
pub use signature::{BoundArgs, CallArgs, Param, ParamKey, ParamKind, Signature};
pub use store::{
    CacheCell, CacheEvent, CacheLayout, CacheSlot, CacheStats, CacheStore, CachedValue, CallMap,
    HasCache,
};
pub use value::{ArgValue, FromArgValue, KeyAtom};
