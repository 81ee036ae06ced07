//! Text Scaler - headless driver for the sync core
//!
//! Runs the controller against the real settings store and DDC/CI displays
//! (or in-memory / dry-run stand-ins) with a REPL playing the panel widget.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use text_scaler::config::{AppConfig, SettingsBackend};
use text_scaler::devices::DeviceEnumerator;
use text_scaler::paths;
use text_scaler::runner::{CommandRunner, DryRunRunner, ShellRunner};
use text_scaler::settings::{GsettingsStore, MemoryStore, SettingsStore};
use text_scaler::sync::{SyncHandle, SyncOptions};

/// Text Scaler - keep a slider, a text entry, the desktop setting and
/// monitor brightness in sync
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Use the 0-100 brightness profile instead of the configured range
    #[arg(long)]
    brightness: bool,

    /// Skip device discovery (settings-only mode)
    #[arg(long)]
    no_devices: bool,

    /// Print discovered devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Log external commands instead of running them (no settings monitor either)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting Text Scaler v{}...", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;

    let runner: Arc<dyn CommandRunner> = if args.dry_run {
        info!("Dry-run mode: external commands are logged, not executed");
        Arc::new(DryRunRunner::new())
    } else {
        Arc::new(ShellRunner)
    };

    let mut devices_config = config.devices.clone();
    if args.no_devices {
        devices_config.enabled = false;
    }
    let enumerator = DeviceEnumerator::new(runner.clone(), devices_config);

    if args.list_devices {
        let devices = tokio::task::spawn_blocking(move || enumerator.try_discover())
            .await
            .context("Device discovery task failed")??;
        cli::print_devices(&devices);
        return Ok(());
    }

    let options = SyncOptions::from_config(&config)?;
    let key = config.settings.key.clone();

    let (store, memory): (Arc<dyn SettingsStore>, Option<MemoryStore>) =
        match config.settings.backend {
            SettingsBackend::Memory => {
                let memory = MemoryStore::with_value(key.clone(), config.value.default);
                info!("Using in-memory settings store ('{}')", key);
                (Arc::new(memory.clone()), Some(memory))
            }
            SettingsBackend::Gsettings => {
                info!(
                    "Using gsettings store ({} {})",
                    config.settings.schema_id, key
                );
                let store = GsettingsStore::new(runner.clone(), config.settings.schema_id.clone());
                (Arc::new(store), None)
            }
        };

    let handle = SyncHandle::spawn(options, store, enumerator, cli::ConsoleView::new());
    let repl = cli::Repl::new(handle.clone(), memory, key);

    tokio::select! {
        result = repl.run() => result?,
        _ = shutdown_signal() => {}
    }

    if let Err(e) = handle.shutdown().await {
        warn!("Controller already stopped: {}", e);
    }

    info!("Text Scaler shutdown complete");
    Ok(())
}

/// Load the config file, falling back to defaults when it does not exist
async fn load_config(args: &Args) -> Result<AppConfig> {
    let path = args.config.clone().unwrap_or_else(paths::default_config_path);

    let mut config = if path.exists() {
        info!("Configuration file: {}", path.display());
        AppConfig::load(&path).await?
    } else if args.config.is_some() {
        anyhow::bail!("Config file not found: {}", path.display());
    } else {
        warn!(
            "No config file at {}, using built-in defaults",
            path.display()
        );
        AppConfig::default()
    };

    if args.brightness {
        let brightness = AppConfig::brightness();
        config.value = brightness.value;
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // stderr keeps log lines apart from REPL output
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
