//! Settings persisted by the file backend survive a restart

use nvsettings_core::store::file_store::FORMAT_VERSION;
use nvsettings_core::{FileStore, Registry, Setting, StorageState};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

struct Device {
    registry: Registry,
    brightness: Arc<Setting<u8>>,
    calibration: Arc<Setting<f32>>,
    boot_count: Arc<Setting<u64>>,
    test: Arc<Setting<i32>>,
}

impl Device {
    fn boot(dir: &TempDir) -> Self {
        let registry = Registry::new("Global", Arc::new(FileStore::new(dir.path())));
        let brightness = Setting::new("brightness", 80u8, &registry);
        let calibration = Setting::new("calibration", 1.0f32, &registry);
        let boot_count = Setting::<u64>::zeroed("boot_count", &registry);
        let test = Setting::<i32>::zeroed("test", &registry);
        registry.load().unwrap();
        Self {
            registry,
            brightness,
            calibration,
            boot_count,
            test,
        }
    }
}

#[test]
fn test_values_survive_reboot() {
    let dir = TempDir::new().unwrap();

    {
        let device = Device::boot(&dir);
        assert_eq!(device.brightness.get(), 80);
        device.brightness.set(20);
        device.calibration.set(0.975);
        device.boot_count.set(device.boot_count.get() + 1);
        device.test.set(-7);
        let report = device.registry.save().unwrap();
        assert!(report.is_complete());
    }

    let device = Device::boot(&dir);
    assert_eq!(device.brightness.get(), 20);
    assert_eq!(device.calibration.get(), 0.975);
    assert_eq!(device.boot_count.get(), 1);
    assert_eq!(device.test.get(), -7);
    assert!(!device.registry.has_dirty());
}

#[test]
fn test_newer_format_is_erased_on_boot() {
    let dir = TempDir::new().unwrap();
    {
        let device = Device::boot(&dir);
        device.brightness.set(10);
        device.registry.save().unwrap();
    }

    // Pretend a newer firmware rewrote the store
    let mut marker = fs::read(dir.path().join("FORMAT")).unwrap();
    let last = marker.len() - 1;
    marker[last] = FORMAT_VERSION + 1;
    fs::write(dir.path().join("FORMAT"), marker).unwrap();

    let device = Device::boot(&dir);
    assert_eq!(device.registry.storage_state(), StorageState::Ready);
    assert_eq!(device.brightness.get(), 80);
}

#[test]
fn test_corrupt_marker_fails_storage_for_good() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("FORMAT"), b"garbage").unwrap();

    let registry = Registry::new("Global", Arc::new(FileStore::new(dir.path())));
    let brightness = Setting::new("brightness", 80u8, &registry);
    brightness.set(1);

    assert!(registry.load().is_err());
    assert!(registry.save().is_err());
    assert!(matches!(registry.storage_state(), StorageState::Failed(_)));
    assert!(brightness.is_dirty());
}

#[test]
fn test_namespaces_are_isolated() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));

    let audio = Registry::new("Audio", store.clone());
    let video = Registry::new("Video", store);
    let audio_level = Setting::new("level", 1u8, &audio);
    let video_level = Setting::new("level", 1u8, &video);

    audio_level.set(5);
    audio.save().unwrap();
    video.load().unwrap();

    assert_eq!(video_level.get(), 1);
    assert!(dir.path().join("Audio.nvs").exists());
}
