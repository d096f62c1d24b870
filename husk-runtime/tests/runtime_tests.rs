mod common;

use common::{expected_key, fixture_module, FixtureEngine};
use husk_error::codes;
use husk_format::{Import, ImportDesc};
use husk_runtime::{FingerprintConfig, HostRuntime};

#[test]
fn derive_session_key_matches_independently_computed_digest() {
    let config = FingerprintConfig::default();
    let module = fixture_module();
    let mut engine = FixtureEngine::new();
    let mut runtime = HostRuntime::instantiate(&mut engine, &module, config.clone()).unwrap();

    let key = runtime.derive_session_key().unwrap();
    assert_eq!(key.len(), 64);
    assert_eq!(key, expected_key(&config));
    assert_eq!(runtime.live_heap_slots(), 0, "no slot survives the call");
}

#[test]
fn identical_configs_derive_identical_keys() {
    let config = FingerprintConfig::default();
    let module = fixture_module();

    let mut first =
        HostRuntime::instantiate(&mut FixtureEngine::new(), &module, config.clone()).unwrap();
    let mut second =
        HostRuntime::instantiate(&mut FixtureEngine::new(), &module, config.clone()).unwrap();

    assert_eq!(
        first.derive_session_key().unwrap(),
        second.derive_session_key().unwrap()
    );
}

#[test]
fn different_seeds_derive_different_keys() {
    let module = fixture_module();
    let base = FingerprintConfig::default();
    let reseeded = FingerprintConfig {
        random_seed: base.random_seed ^ 1,
        ..base.clone()
    };

    let mut first = HostRuntime::instantiate(&mut FixtureEngine::new(), &module, base).unwrap();
    let mut second =
        HostRuntime::instantiate(&mut FixtureEngine::new(), &module, reseeded).unwrap();

    assert_ne!(
        first.derive_session_key().unwrap(),
        second.derive_session_key().unwrap()
    );
}

#[test]
fn transform_round_trips_mixed_ascii_and_non_ascii() {
    let config = FingerprintConfig::default();
    let module = fixture_module();
    let mut engine = FixtureEngine::new();
    let mut runtime = HostRuntime::instantiate(&mut engine, &module, config.clone()).unwrap();

    let key = runtime.derive_session_key().unwrap();
    // The ASCII fast path must hand over to the general encoder at the
    // airplane and come back intact in both directions
    let result = runtime.transform("hello ✈ world", &key).unwrap();
    assert_eq!(result, "hello ✈ world");
}

#[test]
fn transform_survives_memory_growth_mid_call() {
    let config = FingerprintConfig::default();
    let module = fixture_module();
    let mut engine = FixtureEngine::new();
    let mut runtime = HostRuntime::instantiate(&mut engine, &module, config).unwrap();

    let key = runtime.derive_session_key().unwrap();
    // Large enough that the guest allocator grows linear memory between
    // marshalling steps, forcing the view cache to rebuild
    let payload: String = "abcdefgh".repeat(16 * 1024);
    let result = runtime.transform(&payload, &key).unwrap();
    assert_eq!(result, payload);
}

#[test]
fn guest_signalled_failure_becomes_guest_panic() {
    let config = FingerprintConfig::default();
    let module = fixture_module();
    let mut engine = FixtureEngine::new();
    let mut runtime = HostRuntime::instantiate(&mut engine, &module, config).unwrap();

    let err = runtime.transform("payload", "short-key").unwrap_err();
    assert_eq!(err.code, codes::GUEST_PANIC);
    assert!(err.message.contains("64 hex"));
    assert_eq!(runtime.live_heap_slots(), 0, "the thrown value is unboxed");
}

#[test]
fn malformed_key_is_rejected_not_accepted() {
    let config = FingerprintConfig::default();
    let module = fixture_module();
    let mut engine = FixtureEngine::with_malformed_key();
    let mut runtime = HostRuntime::instantiate(&mut engine, &module, config).unwrap();

    let err = runtime.derive_session_key().unwrap_err();
    assert_eq!(err.code, codes::INVALID_KEY_FORMAT);
}

#[test]
fn missing_import_fails_at_build_time_naming_the_pair() {
    let config = FingerprintConfig::default();
    let mut module = fixture_module();
    module.imports.push(Import {
        module: "wbg".to_owned(),
        field: "__wbg_vibrate_deadbeef01234567".to_owned(),
        desc: ImportDesc::Function { type_index: 0 },
    });
    module.import_function_count += 1;

    let err = HostRuntime::instantiate(&mut FixtureEngine::new(), &module, config).unwrap_err();
    assert_eq!(err.code, codes::MISSING_IMPORT);
    assert!(
        err.message.contains("wbg.__wbg_vibrate_deadbeef01234567"),
        "error names the exact pair: {}",
        err.message
    );
}

#[test]
fn storage_session_identifier_reaches_the_derived_key() {
    let module = fixture_module();
    let base = FingerprintConfig::default();
    let other_session = FingerprintConfig {
        session_id: "00000000-1111-4222-8333-444444444444".to_owned(),
        ..base.clone()
    };

    let mut first = HostRuntime::instantiate(&mut FixtureEngine::new(), &module, base).unwrap();
    let mut second =
        HostRuntime::instantiate(&mut FixtureEngine::new(), &module, other_session).unwrap();

    assert_ne!(
        first.derive_session_key().unwrap(),
        second.derive_session_key().unwrap(),
        "the guest reads the session identifier out of storage"
    );
}
