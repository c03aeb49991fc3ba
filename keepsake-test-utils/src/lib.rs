//! keepsake Test Utilities
//!
//! Shared test infrastructure for the keepsake workspace:
//! - Fixture hosts with call counters and ready-made cached accessors
//! - Proptest generators for argument values and call shapes
//! - Assertions for cache identity and contents

// Re-export core types for convenience
pub use keepsake::{
    ArgValue, BoundArgs, CacheCell, CacheError, CacheResult, CachedMethod, CachedProperty,
    CallArgs, HasCache, KeyAtom, Param, ParamKey, Signature,
};

use std::cell::Cell;

/// Counts how often a wrapped function actually ran.
#[derive(Debug, Default)]
pub struct CallCounter(Cell<u32>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.set(self.0.get() + 1);
    }

    pub fn count(&self) -> u32 {
        self.0.get()
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built hosts and accessors for common testing scenarios.

    use super::*;
    use keepsake::{clear_keys, impl_has_cache, meth, prop, CacheInvalidator};
    use once_cell::sync::Lazy;

    /// Default of the `y` parameter of [`PAIR`].
    pub const PAIR_DEFAULT_Y: i64 = 2;

    /// A host with two plain fields and a counter per cached accessor.
    #[derive(Debug)]
    pub struct Widget {
        pub cache: CacheCell,
        pub use_cache: bool,
        pub a: i64,
        pub b: i64,
        pub size_calls: CallCounter,
        pub pair_calls: CallCounter,
        pub echo_calls: CallCounter,
        pub total_calls: CallCounter,
    }

    impl_has_cache!(Widget, cache, use_cache);

    impl Widget {
        /// Host with a lazily created cache.
        pub fn new() -> Self {
            Self::with_cell(CacheCell::new())
        }

        /// Host that declares its (empty) cache up front.
        pub fn declared() -> Self {
            Self::with_cell(CacheCell::declared())
        }

        /// Host whose layout has no room for a cache.
        pub fn sealed() -> Self {
            Self::with_cell(CacheCell::sealed())
        }

        /// Host for opt-in accessors.
        pub fn opting(use_cache: bool) -> Self {
            Self {
                use_cache,
                ..Self::new()
            }
        }

        fn with_cell(cache: CacheCell) -> Self {
            Self {
                cache,
                use_cache: false,
                a: 1,
                b: 2,
                size_calls: CallCounter::new(),
                pair_calls: CallCounter::new(),
                echo_calls: CallCounter::new(),
                total_calls: CallCounter::new(),
            }
        }

        pub fn compute_size(&self) -> CacheResult<Vec<i64>> {
            self.size_calls.bump();
            Ok(vec![10])
        }

        pub fn compute_pair(&self, args: &BoundArgs) -> CacheResult<Vec<i64>> {
            self.pair_calls.bump();
            Ok(vec![args.arg::<i64>("x")?, args.arg::<i64>("y")?])
        }

        pub fn compute_echo(&self, args: &BoundArgs) -> CacheResult<ArgValue> {
            self.echo_calls.bump();
            args.arg::<ArgValue>("value")
        }

        pub fn compute_total(&self) -> CacheResult<i64> {
            self.total_calls.bump();
            Ok(self.a + self.b)
        }

        pub fn compute_double_a(&self) -> CacheResult<i64> {
            Ok(self.a * 2)
        }

        /// Setter guarded by [`CLEAR_A_B`].
        pub fn set_a(&mut self, a: i64) -> CacheResult<()> {
            CLEAR_A_B.run(self, |w| w.a = a)
        }
    }

    impl Default for Widget {
        fn default() -> Self {
            Self::new()
        }
    }

    /// `(x, y=2)`
    pub fn pair_signature() -> Signature {
        Signature::new([
            Param::positional("x"),
            Param::positional("y").with_default(PAIR_DEFAULT_Y),
        ])
        .expect("pair signature is well formed")
    }

    /// `(value)`
    pub fn echo_signature() -> Signature {
        Signature::new([Param::positional("value")]).expect("echo signature is well formed")
    }

    /// Always-on property returning a fresh `[10]`.
    pub static SIZE: Lazy<CachedProperty<Widget, Vec<i64>>> =
        Lazy::new(|| prop("size", Widget::compute_size).with_doc("A one-element list."));

    /// Opt-in variant of [`SIZE`].
    pub static GATED_SIZE: Lazy<CachedProperty<Widget, Vec<i64>>> = Lazy::new(|| {
        prop("gated_size", Widget::compute_size).check_use_cache(true)
    });

    /// `a + b`, stored under the key `b`.
    pub static TOTAL: Lazy<CachedProperty<Widget, i64>> =
        Lazy::new(|| prop("total", Widget::compute_total).with_key("b"));

    /// `a * 2`, stored under the key `a`.
    pub static DOUBLE_A: Lazy<CachedProperty<Widget, i64>> =
        Lazy::new(|| prop("double_a", Widget::compute_double_a).with_key("a"));

    /// `[x, y]` with `y` defaulting to 2.
    pub static PAIR: Lazy<CachedMethod<Widget, Vec<i64>>> =
        Lazy::new(|| meth("method", pair_signature(), Widget::compute_pair));

    /// Returns its argument unchanged.
    pub static ECHO: Lazy<CachedMethod<Widget, ArgValue>> =
        Lazy::new(|| meth("thing", echo_signature(), Widget::compute_echo));

    /// Purges the entries `a` and `b`.
    pub static CLEAR_A_B: Lazy<CacheInvalidator> = Lazy::new(|| clear_keys(["a", "b"]));
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for argument values and call shapes.

    use super::fixtures::PAIR_DEFAULT_Y;
    use super::*;
    use proptest::prelude::*;

    /// Generate a scalar argument.
    pub fn arb_scalar() -> impl Strategy<Value = ArgValue> {
        prop_oneof![
            Just(ArgValue::None),
            any::<bool>().prop_map(ArgValue::Bool),
            any::<i64>().prop_map(ArgValue::Int),
            (-1.0e9f64..1.0e9).prop_map(ArgValue::Float),
            "[a-z]{0,8}".prop_map(ArgValue::Str),
        ]
    }

    /// Generate an argument that can be part of a cache key.
    pub fn arb_hashable() -> impl Strategy<Value = ArgValue> {
        arb_scalar().prop_recursive(2, 12, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(ArgValue::Tuple)
        })
    }

    /// Generate an argument that contains a list or a map somewhere.
    pub fn arb_unhashable() -> impl Strategy<Value = ArgValue> {
        let container = prop_oneof![
            prop::collection::vec(arb_scalar(), 0..4).prop_map(ArgValue::List),
            prop::collection::btree_map("[a-z]{1,4}", arb_scalar(), 0..4).prop_map(ArgValue::Map),
        ];
        container.prop_recursive(1, 8, 3, |inner| {
            (inner, prop::collection::vec(arb_hashable(), 0..3)).prop_map(|(bad, mut rest)| {
                rest.push(bad);
                ArgValue::Tuple(rest)
            })
        })
    }

    /// Every way of spelling a call to `(x, y=2)` with effective
    /// arguments `x` and `y`.
    pub fn pair_call_forms(x: &ArgValue, y: &ArgValue) -> Vec<CallArgs> {
        let mut forms = vec![
            CallArgs::new().arg(x.clone()).arg(y.clone()),
            CallArgs::new().arg(x.clone()).kwarg("y", y.clone()),
            CallArgs::new().kwarg("x", x.clone()).kwarg("y", y.clone()),
            CallArgs::new().kwarg("y", y.clone()).kwarg("x", x.clone()),
        ];
        if *y == ArgValue::Int(PAIR_DEFAULT_Y) {
            forms.push(CallArgs::new().arg(x.clone()));
            forms.push(CallArgs::new().kwarg("x", x.clone()));
        }
        forms
    }

    /// Generate one spelling of a call to `(x, y=2)`.
    pub fn arb_pair_call(x: ArgValue, y: ArgValue) -> impl Strategy<Value = CallArgs> {
        prop::sample::select(pair_call_forms(&x, &y))
    }

    /// Generate integer effective arguments `(x, y)` for `(x, y=2)`,
    /// biased towards the default.
    pub fn arb_pair_ints() -> impl Strategy<Value = (i64, i64)> {
        (any::<i64>(), prop_oneof![Just(PAIR_DEFAULT_Y), -100i64..100])
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cache identity and contents.

    use super::*;
    use std::rc::Rc;

    /// Assert two reads returned the very same stored value.
    #[track_caller]
    pub fn assert_same<T: std::fmt::Debug>(left: &Rc<T>, right: &Rc<T>) {
        assert!(
            Rc::ptr_eq(left, right),
            "Expected the same cached value, got {:?} and {:?}",
            left,
            right
        );
    }

    /// Assert two reads returned distinct values.
    #[track_caller]
    pub fn assert_distinct<T: std::fmt::Debug>(left: &Rc<T>, right: &Rc<T>) {
        assert!(
            !Rc::ptr_eq(left, right),
            "Expected distinct values, both reads returned {:?}",
            left
        );
    }

    /// Assert the host's top-level cache keys, in sorted order.
    #[track_caller]
    pub fn assert_cache_keys<H: HasCache>(host: &H, expected: &[&str]) {
        let keys = host.cache().keys();
        assert_eq!(keys, expected, "Unexpected cache keys");
    }

    /// Assert a result is the `MissingCache` error.
    #[track_caller]
    pub fn assert_missing_cache<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::MissingCache) => {}
            other => panic!("Expected MissingCache error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::assertions::*;
    use super::fixtures::*;
    use super::generators::*;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_call_counter() {
        let counter = CallCounter::new();
        counter.bump();
        counter.bump();
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn test_widget_layouts() {
        assert!(!Widget::new().cache.is_initialized());
        assert!(Widget::declared().cache.is_initialized());
        assert_missing_cache(&SIZE.get(&Widget::sealed()));
    }

    #[test]
    fn test_fixture_accessors() {
        let widget = Widget::new();
        let size = SIZE.get(&widget).unwrap();
        assert_same(&size, &SIZE.get(&widget).unwrap());
        assert_eq!(*PAIR.call(&widget, &CallArgs::new().arg(5)).unwrap(), vec![5, 2]);
        assert_cache_keys(&widget, &["method", "size"]);
    }

    #[test]
    fn test_default_call_forms_included() {
        let x = ArgValue::Int(1);
        assert_eq!(pair_call_forms(&x, &ArgValue::Int(PAIR_DEFAULT_Y)).len(), 6);
        assert_eq!(pair_call_forms(&x, &ArgValue::Int(9)).len(), 4);
    }

    proptest! {
        #[test]
        fn prop_hashable_values_are_hashable(value in arb_hashable()) {
            prop_assert!(value.is_hashable());
            prop_assert!(value.to_key_atom().is_ok());
        }

        #[test]
        fn prop_unhashable_values_are_rejected(value in arb_unhashable()) {
            prop_assert!(!value.is_hashable());
            let is_unhashable = matches!(value.to_key_atom(), Err(CacheError::Unhashable { .. }));
            prop_assert!(is_unhashable);
        }

        #[test]
        fn prop_pair_forms_bind_alike((x, y) in arb_pair_ints()) {
            let signature = pair_signature();
            let forms = pair_call_forms(&ArgValue::Int(x), &ArgValue::Int(y));
            let expected = ParamKey::positional([x, y]);
            for call in forms {
                let key = signature.bind(&call).unwrap().param_key().unwrap();
                prop_assert_eq!(&key, &expected);
            }
        }
    }
}
