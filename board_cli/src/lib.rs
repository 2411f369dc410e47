//! # board_cli
//!
//! Shared plumbing for the `board-*` binaries: common flags, configuration
//! resolution, logging, and the shutdown signal.
//!
//! Configuration layers, later wins: built-in defaults, the JSON file given
//! by `--config` (or `BOARD_CONFIG_PATH`), `BOARD_*` environment variables
//! (a `.env` file is loaded first), then command-line flags.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use board_common::configs::{ConfigOverrides, ReconnectPolicy};
use board_common::feed::FeedEntry;
use board_common::loggers::setup_logging;
use board_common::session::FileSessionStore;
use board_common::{ApiClient, ClientConfig, SessionService};
use clap::Args;
use tokio::signal;

/// Flags accepted by every `board-*` command.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    #[arg(long = "config", env = "BOARD_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[arg(long, help = "Backend base URL, e.g. http://localhost:8000.")]
    pub backend_url: Option<String>,

    #[arg(long, help = "File holding the persisted session.")]
    pub session_file: Option<PathBuf>,

    #[arg(long, help = "Directory for log files. Logs go to stdout only when unset.")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[arg(long, help = "Extra attempts for transient transport failures.")]
    pub transport_retries: Option<u32>,

    #[arg(long, requires = "reconnect_max_delay_ms", help = "Base delay in milliseconds for live stream reconnects.")]
    pub reconnect_base_delay_ms: Option<u64>,

    #[arg(long, requires = "reconnect_base_delay_ms", help = "Maximum delay in milliseconds for live stream reconnects.")]
    pub reconnect_max_delay_ms: Option<u64>,
}

impl CommonArgs {
    fn overrides(&self) -> ConfigOverrides {
        let reconnect = match (self.reconnect_base_delay_ms, self.reconnect_max_delay_ms) {
            (Some(base_delay_ms), Some(max_delay_ms)) => Some(ReconnectPolicy {
                base_delay_ms,
                max_delay_ms,
            }),
            _ => None,
        };
        ConfigOverrides {
            backend_url: self.backend_url.clone(),
            session_file: self.session_file.clone(),
            log_dir: self.log_dir.clone(),
            log_level: self.log_level.clone(),
            transport_retries: self.transport_retries,
            reconnect,
            ..ConfigOverrides::default()
        }
    }
}

/// Everything a command needs once start-up is done.
pub struct App {
    pub config: ClientConfig,
    pub client: Arc<ApiClient>,
    _log_guard: Option<board_common::loggers::WorkerGuard>,
}

/// Resolve configuration, install logging, rehydrate the session and build
/// the api client.
pub fn bootstrap(args: &CommonArgs, log_prefix: &str) -> Result<App> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let config = ClientConfig::load(args.config_path.as_deref())
        .and_then(|c| c.apply(args.overrides()))
        .context("Invalid configuration")?;

    let log_guard = setup_logging(config.log_dir.as_deref(), &config.log_level, log_prefix)
        .context("Failed to set up logging")?;

    tracing::debug!(backend = %config.backend_url, session_file = %config.session_file.display(), "Configuration resolved");

    let store = FileSessionStore::new(&config.session_file);
    let session = Arc::new(SessionService::open(Arc::new(store)));
    let client = ApiClient::new(config.clone(), session).context("Failed to build API client")?;

    Ok(App {
        config,
        client: Arc::new(client),
        _log_guard: log_guard,
    })
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let terminate = async {
        #[cfg(unix)]
        {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut term) => {
                    term.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        std::future::pending::<()>().await;
    };

    tokio::select! {
        _ = signal::ctrl_c() => tracing::info!("Ctrl-C received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}

/// Entries of `current` that were not in `previous`, newest first. Both are
/// whole feed-log snapshots, so an entry is new only if no identical one was
/// retained before.
#[must_use]
pub fn new_entries(previous: &[FeedEntry], current: &[FeedEntry]) -> Vec<FeedEntry> {
    current
        .iter()
        .filter(|entry| !previous.contains(entry))
        .cloned()
        .collect()
}
