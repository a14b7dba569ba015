//! CLI bootstrap - wire settings, storage and the backend into a controller.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::api::HttpBackend;
use crate::cache::SystemClock;
use crate::controller::AppController;
use crate::events::{ChannelSink, ClientEvent};
use crate::settings::SettingsManager;
use crate::storage::{FileStore, PersistentStore};

use super::args::Args;

/// Context for CLI execution containing all initialized services.
pub struct CliContext {
    pub controller: AppController,

    /// Events emitted by the controller, drained after each command
    pub event_rx: mpsc::UnboundedReceiver<ClientEvent>,

    /// Command-line arguments
    pub args: Args,
}

/// Initialize the CLI context and restore the previous session.
pub async fn initialize(args: &Args) -> Result<CliContext> {
    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        // Only warn on errors other than file not found
        if !matches!(e, dotenvy::Error::Io(_)) {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    let settings_manager = Arc::new(
        SettingsManager::new()
            .await
            .context("Failed to initialize settings manager")?,
    );

    // Ensure settings file exists (creates template on first run)
    if let Err(e) = settings_manager.ensure_settings_file().await {
        tracing::warn!("Failed to create settings template: {}", e);
    }

    let settings = settings_manager.get().await;

    // Initialize logging based on verbosity
    let log_level = if args.verbose {
        "debug"
    } else {
        settings.logging.level.as_str()
    };
    let directive: tracing_subscriber::filter::Directive = format!("memo={}", log_level)
        .parse()
        .with_context(|| format!("Invalid log level '{}'", log_level))?;
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .try_init();

    let base_url = match &args.base_url {
        Some(url) => url.clone(),
        None => settings_manager.backend_url().await,
    };
    let data_dir = match &args.data_dir {
        Some(dir) => dir.clone(),
        None => settings_manager.data_dir().await,
    };

    if args.verbose {
        eprintln!(
            "[cli] Settings loaded from {}",
            settings_manager.path().display()
        );
        eprintln!("[cli] Backend: {}", base_url);
        eprintln!("[cli] Data directory: {}", data_dir.display());
    }

    let backend = HttpBackend::new(&base_url).context("Failed to configure backend client")?;
    let file_store = FileStore::open(&data_dir)
        .with_context(|| format!("Failed to open state in {}", data_dir.display()))?;
    let store = PersistentStore::new(Arc::new(file_store));

    let (sink, event_rx) = ChannelSink::new();
    let mut controller =
        AppController::new(Arc::new(backend), store, Arc::new(SystemClock), Arc::new(sink));

    controller
        .initialize()
        .await
        .context("Failed to initialize client state")?;

    Ok(CliContext {
        controller,
        event_rx,
        args: args.clone(),
    })
}
