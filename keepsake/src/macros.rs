//! Utility macros for reducing boilerplate

/// Macro to implement `HasCache` for a host type.
///
/// The first form names the `CacheCell` field. The second form also names
/// a `bool` field consulted by accessors built with `check_use_cache`.
///
/// # Example
/// ```ignore
/// impl_has_cache!(Rect, cache);
/// // Expands to:
/// impl keepsake::HasCache for Rect {
///     fn cache(&self) -> &keepsake::CacheCell {
///         &self.cache
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_has_cache {
    ($type:ty, $cache_field:ident) => {
        impl $crate::HasCache for $type {
            fn cache(&self) -> &$crate::CacheCell {
                &self.$cache_field
            }
        }
    };
    ($type:ty, $cache_field:ident, $use_cache_field:ident) => {
        impl $crate::HasCache for $type {
            fn cache(&self) -> &$crate::CacheCell {
                &self.$cache_field
            }

            fn use_cache(&self) -> bool {
                self.$use_cache_field
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{CacheCell, CacheGate, HasCache};

    struct Plain {
        cache: CacheCell,
    }

    struct Gated {
        store: CacheCell,
        enabled: bool,
    }

    impl_has_cache!(Plain, cache);
    impl_has_cache!(Gated, store, enabled);

    #[test]
    fn test_generated_impls() {
        let plain = Plain {
            cache: CacheCell::declared(),
        };
        assert!(plain.cache().is_initialized());
        assert!(!plain.use_cache());

        let gated = Gated {
            store: CacheCell::new(),
            enabled: true,
        };
        assert!(gated.use_cache());
        assert!(CacheGate::opt_in().is_open(&gated));
        assert!(!gated.cache().is_initialized());
    }
}
