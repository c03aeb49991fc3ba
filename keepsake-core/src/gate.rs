//! Opt-in switch for cached accessors.

use crate::store::HasCache;

/// Decides per host whether an accessor may use the cache.
///
/// An accessor built with `check_use_cache` consults [`HasCache::use_cache`]
/// on every access; when it returns false the compute runs directly and the
/// store is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheGate {
    check_use_cache: bool,
}

impl CacheGate {
    pub const fn new(check_use_cache: bool) -> Self {
        Self { check_use_cache }
    }

    /// A gate that never consults the host.
    pub const fn always() -> Self {
        Self::new(false)
    }

    /// A gate that caches only for hosts whose `use_cache` is true.
    pub const fn opt_in() -> Self {
        Self::new(true)
    }

    pub const fn checks_use_cache(&self) -> bool {
        self.check_use_cache
    }

    pub fn is_open<H: HasCache + ?Sized>(&self, host: &H) -> bool {
        !self.check_use_cache || host.use_cache()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CacheCell;

    struct Host {
        cache: CacheCell,
        use_cache: bool,
    }

    impl HasCache for Host {
        fn cache(&self) -> &CacheCell {
            &self.cache
        }

        fn use_cache(&self) -> bool {
            self.use_cache
        }
    }

    struct Plain {
        cache: CacheCell,
    }

    impl HasCache for Plain {
        fn cache(&self) -> &CacheCell {
            &self.cache
        }
    }

    #[test]
    fn test_always_ignores_host_flag() {
        let host = Host {
            cache: CacheCell::new(),
            use_cache: false,
        };
        assert!(CacheGate::always().is_open(&host));
    }

    #[test]
    fn test_opt_in_follows_host_flag() {
        let mut host = Host {
            cache: CacheCell::new(),
            use_cache: false,
        };
        let gate = CacheGate::opt_in();
        assert!(!gate.is_open(&host));

        host.use_cache = true;
        assert!(gate.is_open(&host));
    }

    #[test]
    fn test_default_use_cache_is_off() {
        let plain = Plain {
            cache: CacheCell::new(),
        };
        assert!(!CacheGate::opt_in().is_open(&plain));
        assert!(CacheGate::default().is_open(&plain));
        assert!(!CacheGate::default().checks_use_cache());
    }
}
