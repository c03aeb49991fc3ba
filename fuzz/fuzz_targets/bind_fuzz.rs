//! Fuzz test for signature binding and call keys
//!
//! Feeds arbitrary JSON call descriptions through `CallArgs::from_json`,
//! binds them against signatures of every parameter kind, and builds the
//! call key. Looks for:
//! - Panics in binding or key building
//! - Keys that differ between two bindings of the same call
//! - Unhashable errors for calls without list or map arguments
//!
//! Run with: cargo +nightly fuzz run bind_fuzz -- -max_total_time=60

#![no_main]

use keepsake_core::{ArgValue, CacheError, CallArgs, Param, Signature};
use libfuzzer_sys::fuzz_target;

fn signatures() -> Vec<Signature> {
    let declared = [
        vec![],
        vec![Param::positional("x"), Param::positional("y").with_default(2)],
        vec![
            Param::positional_only("a"),
            Param::var_positional("rest"),
            Param::keyword_only("flag").with_default(false),
            Param::var_keyword("extra"),
        ],
        vec![Param::keyword_only("k"), Param::var_keyword("kw")],
    ];
    declared
        .into_iter()
        .filter_map(|params| Signature::new(params).ok())
        .collect()
}

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let call = CallArgs::from_json(value);
    let hashable = call.positional().iter().all(ArgValue::is_hashable)
        && call.keywords().iter().all(|(_, v)| v.is_hashable());

    for signature in signatures() {
        let Ok(bound) = signature.bind(&call) else {
            continue;
        };
        match bound.param_key() {
            Ok(key) => {
                let again = signature
                    .bind(&call)
                    .ok()
                    .and_then(|b| b.param_key().ok());
                assert_eq!(Some(&key), again.as_ref(), "binding is not deterministic");
                assert!(!key.to_string().is_empty());
            }
            Err(CacheError::Unhashable { .. }) => {
                assert!(!hashable, "hashable call rejected as unhashable");
            }
            Err(other) => panic!("unexpected key error: {other}"),
        }
    }
});
