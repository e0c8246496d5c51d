//! Declares a few settings, changes them and persists them to a data directory
//!
//! Run with:
//! ```bash
//! cargo run --example settings_demo -- /tmp/nvs-demo
//! ```

use nvsettings_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use nvsettings_core::{spawn_autosave, FileStore, Registry, Setting};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_with_config(LogConfig::new(LogLevel::Debug).with_target(false))?;

    let dir = std::env::args().nth(1).unwrap_or_else(|| "./nvs-demo".to_string());
    let registry = Arc::new(Registry::new("Global", Arc::new(FileStore::new(&dir))));

    let boots = Setting::<u32>::zeroed("boots", &registry);
    let brightness = Setting::new("brightness", 200u8, &registry);
    let offset = Setting::new("temp_offset", 0.0f32, &registry);

    let report = registry.load()?;
    info!(%report, "loaded");
    info!(boots = boots.get(), brightness = brightness.get(), offset = offset.get(), "current values");

    boots.set(boots.get() + 1);
    let (autosave, task) = spawn_autosave(Arc::clone(&registry), Duration::from_millis(200));

    // A burst of edits ends up in a single commit
    for step in 0..5u8 {
        brightness.set(brightness.get().saturating_sub(10));
        offset.set(offset.get() + 0.1);
        autosave.schedule();
        tokio::time::sleep(Duration::from_millis(20 * u64::from(step))).await;
    }

    drop(autosave);
    task.await?;
    info!(dir = %dir, "settings saved, run again to see them restored");
    Ok(())
}
