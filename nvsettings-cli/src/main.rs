use anyhow::{bail, Result};
use clap::Parser;
use nvsettings_core::config::BackendKind;
use nvsettings_core::logging::{init_logging_with_config, LogConfig};
use nvsettings_core::{metrics, spawn_autosave, Config, Registry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

mod profile;

use profile::DeviceSettings;

#[derive(Parser, Debug)]
#[command(name = "nvsettings")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store settings in this directory (implies the file backend)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Load and print every device setting
    Show {
        /// Print as a JSON object
        #[arg(long)]
        json: bool,
    },
    /// Load, change one setting and save
    Set {
        name: String,
        value: String,
    },
    /// Wipe the settings store
    Erase,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env()?;

    if let Some(dir) = &args.data_dir {
        config.store.backend = BackendKind::File;
        config.store.data_dir = dir.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    config.validate()?;
    Ok(config)
}

/// Open the configured store and load the device profile from it
fn open_device(config: &Config) -> Result<DeviceSettings> {
    let registry = Arc::new(Registry::with_config(&config.registry, config.open_backend()?));
    let device = DeviceSettings::new(registry);

    let report = device.registry().load()?;
    for failure in report.hard_failures() {
        warn!(error = %failure, "setting kept its default");
    }
    Ok(device)
}

fn show(config: &Config, json: bool) -> Result<()> {
    let device = open_device(config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&device.to_json())?);
    } else {
        for (name, value, _) in device.entries() {
            println!("{:<12} = {}", name, value);
        }
    }
    Ok(())
}

async fn set(config: &Config, name: &str, value: &str) -> Result<()> {
    let device = open_device(config)?;
    device.set(name, value)?;
    let registry = Arc::clone(device.registry());

    if config.autosave.enabled {
        let (handle, task) = spawn_autosave(Arc::clone(&registry), config.autosave.debounce);
        handle.schedule();
        // Dropping the last handle flushes the pending save
        drop(handle);
        task.await?;
        if registry.has_dirty() {
            bail!("failed to save '{}'", name);
        }
    } else {
        let report = registry.save()?;
        if !report.is_complete() {
            bail!("{}", report);
        }
    }

    info!(setting = %name, %value, "setting saved");
    Ok(())
}

fn erase(config: &Config) -> Result<()> {
    config.open_backend()?.erase()?;
    info!(backend = ?config.store.backend, "settings store erased");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging_with_config(LogConfig::try_from(&config.logging)?)?;
    metrics::init_metrics();

    match args.command {
        Command::Show { json } => show(&config, json),
        Command::Set { name, value } => set(&config, &name, &value).await,
        Command::Erase => erase(&config),
    }
}
