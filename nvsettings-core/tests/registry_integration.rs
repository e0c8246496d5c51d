//! End-to-end behaviour of settings batches against the in-memory store
//!
//! Run with: cargo test --test registry_integration

use nvsettings_core::{
    MemoryStore, Registry, ScalarValue, Setting, SettingError, StoreError,
};
use std::sync::Arc;
use std::thread;

fn registry() -> (Registry, MemoryStore) {
    let store = MemoryStore::new();
    (Registry::new("Global", Arc::new(store.clone())), store)
}

#[test]
fn test_set_save_reload_round_trip() {
    let (registry, store) = registry();
    let brightness = Setting::new("brightness", 80u8, &registry);
    let offset = Setting::new("offset", 0i32, &registry);

    brightness.set(55);
    offset.set(-42);
    let report = registry.save().unwrap();
    assert!(report.is_complete());
    assert_eq!(report.written, 2);

    // A second registry on the same store sees the committed values
    let reboot = Registry::new("Global", Arc::new(store.clone()));
    let brightness2 = Setting::new("brightness", 80u8, &reboot);
    let offset2 = Setting::new("offset", 0i32, &reboot);
    let report = reboot.load().unwrap();

    assert_eq!(report.loaded, 2);
    assert_eq!(brightness2.get(), 55);
    assert_eq!(offset2.get(), -42);
    assert!(!brightness2.is_dirty());
}

#[test]
fn test_clean_cells_are_not_rewritten() {
    let (registry, store) = registry();
    let volume = Setting::new("volume", 3u8, &registry);
    let _mode = Setting::new("mode", 1u8, &registry);

    volume.set(4);
    registry.save().unwrap();
    let writes_after_first = store.stats().writes;
    assert_eq!(writes_after_first, 1);

    let report = registry.save().unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(report.clean, 2);
    assert_eq!(store.stats().writes, writes_after_first);
}

#[test]
fn test_missing_keys_keep_defaults() {
    let (registry, _store) = registry();
    let timeout = Setting::new("timeout", 30u16, &registry);

    let report = registry.load().unwrap();
    assert_eq!(timeout.get(), 30);
    assert_eq!(report.loaded, 0);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].is_not_found());
    assert_eq!(report.hard_failures().count(), 0);
}

#[test]
fn test_one_failing_write_does_not_block_others() {
    let (registry, store) = registry();
    let a = Setting::new("a", 0u8, &registry);
    let b = Setting::new("b", 0u8, &registry);
    let c = Setting::new("c", 0u8, &registry);
    store.fail_writes_for("b", StoreError::NoSpace("b".to_string()));

    a.set(1);
    b.set(2);
    c.set(3);
    let report = registry.save().unwrap();

    assert_eq!(report.written, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name(), "b");
    assert_eq!(store.value("Global", "a"), Some(ScalarValue::U8(1)));
    assert_eq!(store.value("Global", "b"), None);
    assert_eq!(store.value("Global", "c"), Some(ScalarValue::U8(3)));

    // The failed cell stays dirty and goes out with the next batch
    assert!(b.is_dirty());
    store.clear_failures_for("b");
    let report = registry.save().unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(store.value("Global", "b"), Some(ScalarValue::U8(2)));
}

#[test]
fn test_failed_read_keeps_value_and_dirty_flag() {
    let (registry, store) = registry();
    store.insert("Global", "gain", ScalarValue::I16(-3));
    store.insert("Global", "mute", ScalarValue::Bool(true));
    let gain = Setting::new("gain", 0i16, &registry);
    let mute = Setting::new("mute", false, &registry);
    gain.set(12);
    store.fail_reads_for("gain", StoreError::Backend("bit flip".to_string()));

    let report = registry.load().unwrap();
    assert_eq!(report.loaded, 1);
    assert_eq!(gain.get(), 12);
    assert!(gain.is_dirty());
    assert!(mute.get());
}

#[test]
fn test_stored_value_of_wrong_kind_is_reported() {
    let (registry, store) = registry();
    store.insert("Global", "rate", ScalarValue::U32(48_000));
    let rate = Setting::new("rate", 44_100i32, &registry);

    let report = registry.load().unwrap();
    assert_eq!(rate.get(), 44_100);
    assert!(matches!(
        &report.failures[0],
        SettingError::Store {
            source: StoreError::TypeMismatch { .. },
            ..
        }
    ));
}

#[test]
fn test_concurrent_writers_and_save() {
    let (registry, store) = registry();
    let registry = Arc::new(registry);
    let counter = Setting::new("counter", 0u32, &registry);

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for i in 0..250u32 {
                    counter.set(t * 1000 + i);
                }
            })
        })
        .collect();
    let saver = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            for _ in 0..20 {
                registry.save().unwrap();
            }
        })
    };
    for writer in writers {
        writer.join().unwrap();
    }
    saver.join().unwrap();

    registry.save().unwrap();
    assert!(!counter.is_dirty());
    assert_eq!(
        store.value("Global", "counter"),
        Some(ScalarValue::U32(counter.get()))
    );
}

#[test]
fn test_open_failure_leaves_cells_untouched() {
    let (registry, store) = registry();
    let volume = Setting::new("volume", 1u8, &registry);
    volume.set(9);
    store.set_open_failure(Some(StoreError::NotInitialized));

    assert!(registry.save().is_err());
    assert!(registry.load().is_err());
    assert_eq!(volume.get(), 9);
    assert!(volume.is_dirty());
}
