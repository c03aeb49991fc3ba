//! End-to-end behaviour of cached accessors on fixture hosts.

use std::rc::Rc;

use keepsake::{
    clear_all, clear_keys, decorate, ArgValue, BoundArgs, CacheError, CacheResult, CallArgs,
    DecorateOptions, ParamKey, Signature,
};
use keepsake_test_utils::assertions::*;
use keepsake_test_utils::fixtures::*;
use tracing_subscriber::EnvFilter;

/// Route accessor logs through the test writer; `RUST_LOG=keepsake=trace` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn property_value_is_the_stored_value() {
    let widget = Widget::declared();

    let size = SIZE.get(&widget).expect("read size");
    assert_eq!(*size, vec![10]);

    let stored = widget.cache.value::<Vec<i64>>("size").expect("size stored");
    assert_same(&stored, &size);
    assert_same(&size, &SIZE.get(&widget).expect("read size again"));
    assert_eq!(widget.size_calls.count(), 1);
}

#[test]
fn property_exposes_name_and_doc() {
    assert_eq!(SIZE.name(), "size");
    assert_eq!(SIZE.doc(), Some("A one-element list."));
    assert_eq!(TOTAL.name(), "total");
    assert_eq!(TOTAL.key(), "b");
}

#[test]
fn property_is_read_only() {
    let widget = Widget::new();
    assert_eq!(
        SIZE.set(&widget, vec![1]),
        Err(CacheError::ReadOnly {
            name: "size".to_string()
        })
    );
    SIZE.get(&widget).expect("read size");
    assert!(SIZE.set(&widget, vec![1]).is_err());
    assert_eq!(*SIZE.get(&widget).expect("read size"), vec![10]);
}

#[test]
fn equivalent_method_calls_share_one_entry() {
    let widget = Widget::new();

    let a = PAIR.call(&widget, &CallArgs::new().arg(1).arg(2)).expect("f(1, 2)");
    let b = PAIR.call(&widget, &CallArgs::new().arg(1)).expect("f(1)");
    let c = PAIR
        .call(&widget, &CallArgs::new().kwarg("y", 2).kwarg("x", 1))
        .expect("f(y=2, x=1)");

    assert_eq!(*a, vec![1, 2]);
    assert_same(&a, &b);
    assert_same(&a, &c);
    assert_eq!(widget.pair_calls.count(), 1);
    assert_eq!(widget.cache.calls_len("method"), Some(1));

    let stored = widget
        .cache
        .call_value::<Vec<i64>>("method", &ParamKey::positional([1, 2]))
        .expect("entry keyed by ((1, 2), {})");
    assert_same(&stored, &a);
    assert_eq!(ParamKey::positional([1, 2]).to_string(), "((1, 2), {})");
}

#[test]
fn clearing_setter_removes_only_named_entries() {
    let mut widget = Widget::new();
    DOUBLE_A.get(&widget).expect("read a");
    TOTAL.get(&widget).expect("read b");
    SIZE.get(&widget).expect("read size");
    assert_cache_keys(&widget, &["a", "b", "size"]);

    widget.set_a(5).expect("set a");

    assert_eq!(widget.a, 5);
    assert_cache_keys(&widget, &["size"]);
    assert_eq!(*DOUBLE_A.get(&widget).expect("read a"), 10);
    assert_eq!(*TOTAL.get(&widget).expect("read b"), 7);
}

#[test]
fn opt_in_property_is_not_cached_when_host_declines() {
    let widget = Widget::opting(false);

    let first = GATED_SIZE.get(&widget).expect("first read");
    let second = GATED_SIZE.get(&widget).expect("second read");

    assert_eq!(first, second);
    assert_distinct(&first, &second);
    assert_eq!(widget.size_calls.count(), 2);
    assert!(!widget.cache.is_initialized());
}

#[test]
fn opt_in_property_is_cached_when_host_agrees() {
    let widget = Widget::opting(true);
    let first = GATED_SIZE.get(&widget).expect("first read");
    let second = GATED_SIZE.get(&widget).expect("second read");
    assert_same(&first, &second);
    assert_cache_keys(&widget, &["gated_size"]);
}

#[test]
fn unhashable_argument_leaves_nested_map_empty() {
    init_tracing();
    let widget = Widget::new();
    let value = ArgValue::map([("a", 1)]);

    let result = ECHO
        .call(&widget, &CallArgs::new().arg(value.clone()))
        .expect("echo dict");

    assert_eq!(*result, value);
    assert_eq!(widget.cache.calls_len("thing"), Some(0));
}

#[test]
fn hashable_argument_is_cached_after_unhashable_one() {
    let widget = Widget::new();
    ECHO.call(&widget, &CallArgs::new().arg(ArgValue::list([1])))
        .expect("echo list");
    let first = ECHO.call(&widget, &CallArgs::new().arg(1)).expect("echo 1");
    let second = ECHO.call(&widget, &CallArgs::new().kwarg("value", 1)).expect("echo 1");

    assert_same(&first, &second);
    assert_eq!(widget.echo_calls.count(), 2);
    assert_eq!(widget.cache.calls_len("thing"), Some(1));
}

#[test]
fn reset_recomputes_from_current_state() {
    let mut widget = Widget::new();
    assert_eq!(*TOTAL.get(&widget).expect("read total"), 3);

    widget.a = 2;
    widget.b = 4;
    assert_eq!(*TOTAL.get(&widget).expect("stale total"), 3);

    assert_eq!(widget.cache.reset(), Ok(true));
    assert!(!widget.cache.is_initialized());
    assert_eq!(*TOTAL.get(&widget).expect("fresh total"), 6);
    assert_eq!(widget.total_calls.count(), 2);
}

#[test]
fn clear_all_on_host_without_store_is_silent() {
    let mut widget = Widget::new();
    let cleared = clear_all().run(&mut widget, |w| w.b = 9);
    assert_eq!(cleared, Ok(()));
    assert!(!widget.cache.is_initialized());

    SIZE.get(&widget).expect("read size");
    PAIR.call(&widget, &CallArgs::new().arg(3)).expect("f(3)");
    assert_eq!(clear_all().invalidate(&widget), Ok(2));
    assert_cache_keys(&widget, &[]);
}

#[test]
fn clearing_missing_keys_raises_nothing() {
    let widget = Widget::new();
    SIZE.get(&widget).expect("read size");
    assert_eq!(clear_keys(["nothing", "else"]).invalidate(&widget), Ok(0));
    assert_cache_keys(&widget, &["size"]);
}

#[test]
fn sealed_host_fails_on_first_cached_access() {
    let widget = Widget::sealed();
    assert_missing_cache(&SIZE.get(&widget));
    assert_missing_cache(&PAIR.call(&widget, &CallArgs::new().arg(1)));
    assert_eq!(widget.size_calls.count(), 0);

    // invalidation never needs the store
    assert_eq!(clear_all().invalidate(&widget), Ok(0));
}

#[test]
fn sealed_host_with_closed_gate_still_computes() {
    let widget = Widget::sealed();
    assert_eq!(*GATED_SIZE.get(&widget).expect("uncached read"), vec![10]);
}

#[test]
fn bind_errors_reach_the_caller() {
    let widget = Widget::new();
    let err = PAIR
        .call(&widget, &CallArgs::new().arg(1).kwarg("z", 3))
        .expect_err("unexpected keyword");
    assert!(matches!(err, CacheError::Bind(_)));
    assert_eq!(widget.pair_calls.count(), 0);
}

fn total_ignoring_args(widget: &Widget, _args: &BoundArgs) -> CacheResult<i64> {
    widget.compute_total()
}

#[test]
fn decorated_accessors_follow_their_options() {
    let widget = Widget::new();

    let prop = decorate(DecorateOptions::new().key("there"))
        .apply("prop", Signature::empty(), total_ignoring_args)
        .expect("decorate property");
    let first = prop.call(&widget, &CallArgs::new()).expect("read prop");
    assert_same(&first, &prop.call(&widget, &CallArgs::new()).expect("read prop"));

    let method = decorate(DecorateOptions::new().method())
        .apply("meth", pair_signature(), Widget::compute_pair)
        .expect("decorate method");
    let value = method
        .call(&widget, &CallArgs::new().arg(3).arg(4))
        .expect("call meth");
    assert_eq!(*value, vec![3, 4]);

    assert_cache_keys(&widget, &["meth", "there"]);
    let stored = widget
        .cache
        .call_value::<Vec<i64>>("meth", &ParamKey::positional([3, 4]));
    assert!(stored.is_some_and(|s| Rc::ptr_eq(&s, &value)));
}

#[test]
fn stats_track_hits_and_misses() {
    init_tracing();
    let widget = Widget::new();
    SIZE.get(&widget).expect("miss");
    SIZE.get(&widget).expect("hit");
    SIZE.get(&widget).expect("hit");
    ECHO.call(&widget, &CallArgs::new().arg(ArgValue::list([1])))
        .expect("uncacheable");

    let stats = widget.cache.stats().expect("store exists");
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.uncacheable, 1);
    assert_eq!(stats.entry_count, 1);
    assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn reentrant_getter_can_read_other_accessors() {
    use keepsake::{prop, CachedProperty};
    use once_cell::sync::Lazy;

    fn size_len(w: &Widget) -> CacheResult<usize> {
        Ok(SIZE.get(w)?.len())
    }
    static SIZE_LEN: Lazy<CachedProperty<Widget, usize>> =
        Lazy::new(|| prop("size_len", size_len));

    let widget = Widget::new();
    assert_eq!(*SIZE_LEN.get(&widget).expect("nested read"), 1);
    assert_cache_keys(&widget, &["size", "size_len"]);
}
