use std::sync::Arc;

use modopts_state::{
    ModuleRegistry, OpaqueModuleId, OptionStore, OptionsError, StaticRegistry, StoreConfig,
    ViewEntry,
};
use modopts_test_utils::{init_tracing, module, record, MemoryStorage};
use serde_json::json;

struct Fixture {
    storage: Arc<MemoryStorage>,
    registry: Arc<StaticRegistry>,
    store: OptionStore,
}

impl Fixture {
    fn legacy() -> Self {
        init_tracing();
        let storage = Arc::new(MemoryStorage::new().with_record(
            "RESoptions.M",
            record(&[("legacyKey", json!(1)), ("knownKey", json!(2))]),
        ));
        let registry = Arc::new(StaticRegistry::new([module("M", &[("knownKey", json!(0))])]).unwrap());
        let store = OptionStore::new(storage.clone(), registry.clone(), StoreConfig::default());
        Self {
            storage,
            registry,
            store,
        }
    }

    fn id() -> OpaqueModuleId {
        OpaqueModuleId::from("M")
    }
}

#[tokio::test]
async fn view_keeps_legacy_keys_out_of_live_options() {
    let fx = Fixture::legacy();

    let view = fx.store.load_obsolete(&Fixture::id()).await.unwrap();

    assert_eq!(view.value("legacyKey"), Some(json!(1)));
    assert_eq!(view.value("knownKey"), Some(json!(2)));
    assert!(view.is_obsolete("legacyKey"));

    let module = fx.registry.get(&Fixture::id()).unwrap();
    assert_eq!(module.options().keys().collect::<Vec<_>>(), vec!["knownKey"]);
    assert_eq!(module.option("knownKey").unwrap().default_value(), Some(json!(0)));
}

#[tokio::test]
async fn later_calls_reuse_snapshot_and_track_live_values() {
    let fx = Fixture::legacy();
    let id = Fixture::id();

    fx.store.load_obsolete(&id).await.unwrap();
    fx.store.set(&id, "knownKey", json!(9)).unwrap();
    fx.store.flush().await;
    let view = fx.store.load_obsolete(&id).await.unwrap();

    assert_eq!(fx.storage.get_count(), 1);
    assert_eq!(view.value("knownKey"), Some(json!(9)));
    assert_eq!(view.value("legacyKey"), Some(json!(1)));
}

#[tokio::test]
async fn concurrent_first_loads_share_one_read() {
    let fx = Fixture::legacy();
    let id = Fixture::id();

    let (a, b) = tokio::join!(fx.store.load_obsolete(&id), fx.store.load_obsolete(&id));

    assert_eq!(a.unwrap().len(), 2);
    assert_eq!(b.unwrap().len(), 2);
    assert_eq!(fx.storage.get_count(), 1);
}

#[tokio::test]
async fn view_entries_share_options_but_not_the_container() {
    let fx = Fixture::legacy();
    let id = Fixture::id();

    let view = fx.store.load_obsolete(&id).await.unwrap();
    let Some(ViewEntry::Live(handle)) = view.get("knownKey") else {
        panic!("knownKey should be live");
    };
    handle.set_value(json!("edited"));
    drop(view);

    let module = fx.registry.get(&id).unwrap();
    assert_eq!(module.option("knownKey").unwrap().value(), json!("edited"));
    assert_eq!(module.options().len(), 1);
}

#[tokio::test]
async fn bulk_loaded_module_is_not_reinitialized() {
    let fx = Fixture::legacy();
    let id = Fixture::id();

    fx.store.load_module_options().await.unwrap();
    fx.store.set(&id, "knownKey", json!(5)).unwrap();
    fx.store.flush().await;

    let view = fx.store.load_obsolete(&id).await.unwrap();

    // The obsolete loader still reads storage once for its own snapshot.
    assert_eq!(fx.storage.get_count(), 1);
    assert_eq!(view.value("knownKey"), Some(json!(5)));
    let module = fx.registry.get(&id).unwrap();
    assert_eq!(module.option("knownKey").unwrap().default_value(), Some(json!(0)));
}

#[tokio::test]
async fn export_round_trips_legacy_entries() {
    let fx = Fixture::legacy();

    let view = fx.store.load_obsolete(&Fixture::id()).await.unwrap();

    assert_eq!(
        view.to_record(),
        record(&[("legacyKey", json!(1)), ("knownKey", json!(2))])
    );
}

#[tokio::test]
async fn module_without_stored_record_yields_live_options_only() {
    init_tracing();
    let storage = Arc::new(MemoryStorage::new());
    let registry = Arc::new(StaticRegistry::new([module("fresh", &[("a", json!(true))])]).unwrap());
    let store = OptionStore::new(storage, registry, StoreConfig::default());

    let view = store.load_obsolete(&OpaqueModuleId::from("fresh")).await.unwrap();

    assert_eq!(view.len(), 1);
    assert_eq!(view.obsolete_keys().count(), 0);
    assert_eq!(view.value("a"), Some(json!(true)));
}

#[tokio::test]
async fn unknown_module_is_rejected() {
    let fx = Fixture::legacy();

    let err = fx
        .store
        .load_obsolete(&OpaqueModuleId::from("ghost"))
        .await
        .unwrap_err();

    assert!(matches!(err, OptionsError::UnknownModule(_)));
    assert_eq!(fx.storage.get_count(), 0);
}

#[tokio::test]
async fn read_failure_propagates_and_allows_retry() {
    let fx = Fixture::legacy();
    let id = Fixture::id();

    fx.storage.fail_reads(true);
    assert!(matches!(
        fx.store.load_obsolete(&id).await,
        Err(OptionsError::Storage { .. })
    ));

    fx.storage.fail_reads(false);
    let view = fx.store.load_obsolete(&id).await.unwrap();
    assert_eq!(view.len(), 2);
    assert_eq!(fx.storage.get_count(), 2);
}
