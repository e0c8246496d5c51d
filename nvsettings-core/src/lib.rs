//! Typed persistent settings
//!
//! Declare named, typed [`Setting`] cells against a [`Registry`], then
//! `load` them from and `save` them to a key-value store in one batch.
//!
//! ```
//! use nvsettings_core::{MemoryStore, Registry, Setting};
//! use std::sync::Arc;
//!
//! let registry = Registry::new("Global", Arc::new(MemoryStore::new()));
//! let brightness = Setting::new("brightness", 80u8, &registry);
//!
//! registry.load().unwrap();
//! brightness.set(60);
//! let report = registry.save().unwrap();
//! assert_eq!(report.written, 1);
//! ```

pub mod autosave;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod setting;
pub mod store;

pub use autosave::{spawn_autosave, AutosaveError, AutosaveHandle};
pub use config::{Config, ConfigError};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
pub use registry::{BatchKind, BatchReport, Registry, RegistryError, StorageState};
pub use setting::{Persist, Scalar, Setting, SettingError};
pub use store::{
    FileStore, MemoryStore, ScalarKind, ScalarValue, StoreBackend, StoreError, StoreSession,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_library_exports() {
        let registry = Registry::new("Global", Arc::new(MemoryStore::new()));
        let _flag = Setting::new("flag", false, &registry);
        let _ = LogLevel::Info;
        assert_eq!(registry.names(), vec!["flag"]);
    }
}
