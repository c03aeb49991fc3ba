//! Cache invalidation around mutating operations.
//!
//! An invalidator purges the host's cache before a mutator runs, so every
//! accessor that depends on the mutated state recomputes on its next read.

use std::borrow::Cow;

use keepsake_core::{CacheResult, HasCache};
use tracing::debug;

/// What an invalidator removes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    All,
    Keys(Vec<Cow<'static, str>>),
}

/// Purges a host's cache ahead of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInvalidator {
    target: Target,
}

/// Invalidator that empties the whole store.
pub fn clear_all() -> CacheInvalidator {
    CacheInvalidator { target: Target::All }
}

/// Invalidator that removes the named top-level entries.
///
/// An empty list clears everything, same as [`clear_all`].
pub fn clear_keys<I, K>(keys: I) -> CacheInvalidator
where
    I: IntoIterator<Item = K>,
    K: Into<Cow<'static, str>>,
{
    let mut names: Vec<Cow<'static, str>> = Vec::new();
    for key in keys {
        let key = key.into();
        if !names.contains(&key) {
            names.push(key);
        }
    }
    if names.is_empty() {
        clear_all()
    } else {
        CacheInvalidator {
            target: Target::Keys(names),
        }
    }
}

impl CacheInvalidator {
    pub fn clears_all(&self) -> bool {
        self.target == Target::All
    }

    /// The keys removed, or `None` when everything is cleared.
    pub fn keys(&self) -> Option<Vec<&str>> {
        match &self.target {
            Target::All => None,
            Target::Keys(keys) => Some(keys.iter().map(|k| k.as_ref()).collect()),
        }
    }

    /// Combine two invalidators into one purging both targets.
    pub fn and(self, other: CacheInvalidator) -> CacheInvalidator {
        match (self.target, other.target) {
            (Target::Keys(left), Target::Keys(right)) => clear_keys(left.into_iter().chain(right)),
            _ => clear_all(),
        }
    }

    /// Purge the host's cache. Returns the number of top-level entries
    /// removed; a host without a store is left alone.
    pub fn invalidate<H: HasCache + ?Sized>(&self, host: &H) -> CacheResult<usize> {
        let cell = host.cache();
        let removed = match &self.target {
            Target::All => cell.clear()?,
            Target::Keys(keys) => {
                let mut removed = 0;
                for key in keys {
                    if cell.remove(key)? {
                        removed += 1;
                    }
                }
                removed
            }
        };
        if removed > 0 {
            debug!(removed, all = self.clears_all(), "cache invalidated");
        }
        Ok(removed)
    }

    /// Purge, then run the mutator.
    pub fn run<H, T, F>(&self, host: &mut H, mutator: F) -> CacheResult<T>
    where
        H: HasCache + ?Sized,
        F: FnOnce(&mut H) -> T,
    {
        self.invalidate(&*host)?;
        Ok(mutator(host))
    }
}
