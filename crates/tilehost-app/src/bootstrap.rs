//! Process bootstrap: logging, metrics, signals and the reload controller.

use std::sync::Arc;

use tilehost_config::{BindSettings, ConfigSource, FileConfigSource};
use tilehost_core::Collaborators;
use tilehost_fs::filesystem_collaborators;
use tilehost_telemetry::{GlobalContextGuard, LoggingConfig, Metrics};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::cli::Cli;
use crate::error::{AppError, AppResult};
use crate::reload::{ControlSignal, ReloadController};
use crate::signals::{SIGNAL_BUFFER, spawn_signal_listener};

/// Dependencies required to bootstrap the tile host.
pub(crate) struct BootstrapDependencies {
    logging: LoggingConfig<'static>,
    source: Arc<dyn ConfigSource>,
    collaborators: Collaborators,
    metrics: Metrics,
    bind: BindSettings,
}

impl BootstrapDependencies {
    /// Production dependencies from the command line and the process environment.
    pub(crate) fn from_cli(cli: &Cli) -> AppResult<Self> {
        Self::from_cli_with(cli, |name| std::env::var(name).ok())
    }

    fn from_cli_with<F>(cli: &Cli, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = cli
            .bind_settings(lookup)
            .map_err(|err| AppError::config("bind_settings", err))?;
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            logging: LoggingConfig::default().with_verbosity(cli.verbose, cli.silent),
            source: Arc::new(FileConfigSource::new(cli.config.clone())),
            collaborators: filesystem_collaborators(),
            metrics,
            bind,
        })
    }
}

/// Entry point for the tile host boot sequence.
///
/// # Errors
///
/// Returns an error if logging cannot be installed, the listener settings are
/// invalid, or any generation fails to start.
pub async fn run_app(cli: Cli) -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_cli(&cli)?;
    tilehost_telemetry::init_logging(&dependencies.logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let (signals, signals_rx) = mpsc::channel(SIGNAL_BUFFER);
    let listener = spawn_signal_listener(signals)?;
    let result = run_app_with(dependencies, signals_rx).await;
    listener.abort();
    result
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(
    dependencies: BootstrapDependencies,
    signals: mpsc::Receiver<ControlSignal>,
) -> AppResult<()> {
    let _context = GlobalContextGuard::new("bootstrap");
    let BootstrapDependencies {
        logging: _,
        source,
        collaborators,
        metrics,
        bind,
    } = dependencies;

    info!(
        addr = %bind.socket_addr(),
        rendered = collaborators.rendered.is_some(),
        "tile host starting"
    );
    let controller = ReloadController::new(source, collaborators, metrics, bind);
    match controller.run(signals).await {
        Ok(()) => {
            info!("tile host stopped");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "tile host stopped on a fatal error");
            Err(err)
        }
    }
}
