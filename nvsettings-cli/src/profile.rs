//! The device's declared settings

use anyhow::{anyhow, bail, Result};
use nvsettings_core::{Registry, Scalar, Setting};
use serde_json::{Map, Value};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

/// Settings stored under the device's `Global` namespace
pub struct DeviceSettings {
    registry: Arc<Registry>,
    pub test: Arc<Setting<i32>>,
    pub brightness: Arc<Setting<u8>>,
    pub max_sensors: Arc<Setting<u8>>,
    pub sample_interval_ms: Arc<Setting<u16>>,
    pub temp_offset: Arc<Setting<f32>>,
    pub ntp_enabled: Arc<Setting<bool>>,
}

impl DeviceSettings {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            test: Setting::zeroed("test", &registry),
            brightness: Setting::new("brightness", 255, &registry),
            max_sensors: Setting::new("max_sensors", 10, &registry),
            sample_interval_ms: Setting::new("sample_ms", 750, &registry),
            temp_offset: Setting::new("temp_offset", 0.0, &registry),
            ntp_enabled: Setting::new("ntp_enabled", true, &registry),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// `(name, value, dirty)` in declaration order
    pub fn entries(&self) -> Vec<(&str, String, bool)> {
        vec![
            entry(&self.test),
            entry(&self.brightness),
            entry(&self.max_sensors),
            entry(&self.sample_interval_ms),
            entry(&self.temp_offset),
            entry(&self.ntp_enabled),
        ]
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("test".into(), self.test.get().into());
        map.insert("brightness".into(), self.brightness.get().into());
        map.insert("max_sensors".into(), self.max_sensors.get().into());
        map.insert("sample_ms".into(), self.sample_interval_ms.get().into());
        map.insert("temp_offset".into(), self.temp_offset.get().into());
        map.insert("ntp_enabled".into(), self.ntp_enabled.get().into());
        Value::Object(map)
    }

    /// Parse `raw` into the setting called `name`
    pub fn set(&self, name: &str, raw: &str) -> Result<()> {
        match name {
            "test" => parse_into(&self.test, raw),
            "brightness" => parse_into(&self.brightness, raw),
            "max_sensors" => parse_into(&self.max_sensors, raw),
            "sample_ms" => parse_into(&self.sample_interval_ms, raw),
            "temp_offset" => parse_into(&self.temp_offset, raw),
            "ntp_enabled" => parse_into(&self.ntp_enabled, raw),
            other => bail!(
                "unknown setting '{}' (known: {})",
                other,
                self.registry.names().join(", ")
            ),
        }
    }
}

fn entry<T: Scalar>(cell: &Setting<T>) -> (&str, String, bool) {
    (cell.name(), cell.get().into_value().to_string(), cell.is_dirty())
}

fn parse_into<T>(cell: &Setting<T>, raw: &str) -> Result<()>
where
    T: Scalar + FromStr,
    T::Err: Display,
{
    let value = raw
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow!("invalid value '{}' for {}: {}", raw, cell.name(), e))?;
    cell.set(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvsettings_core::MemoryStore;

    fn device() -> DeviceSettings {
        DeviceSettings::new(Arc::new(Registry::new(
            "Global",
            Arc::new(MemoryStore::new()),
        )))
    }

    #[test]
    fn test_declaration_order() {
        let device = device();
        let names: Vec<_> = device.entries().into_iter().map(|(name, _, _)| name).collect();
        assert_eq!(names, device.registry().names());
        assert_eq!(names[0], "test");
    }

    #[test]
    fn test_set_parses_by_type() {
        let device = device();
        device.set("test", "-12").unwrap();
        device.set("temp_offset", " 0.5 ").unwrap();
        device.set("ntp_enabled", "false").unwrap();

        assert_eq!(device.test.get(), -12);
        assert_eq!(device.temp_offset.get(), 0.5);
        assert!(!device.ntp_enabled.get());
        assert!(device.registry().has_dirty());
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let device = device();
        assert!(device.set("brightness", "256").is_err());
        assert!(device.set("brightness", "bright").is_err());
        assert!(device.set("volume", "1").is_err());
        assert_eq!(device.brightness.get(), 255);
        assert!(!device.brightness.is_dirty());
    }

    #[test]
    fn test_json_view() {
        let device = device();
        device.set("sample_ms", "1000").unwrap();
        let json = device.to_json();
        assert_eq!(json["sample_ms"], 1000);
        assert_eq!(json["ntp_enabled"], true);
    }
}
