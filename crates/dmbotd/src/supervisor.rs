//! Task orchestration for dmbotd.
//!
//! Prepares the daemon directories, wires the configuration store, bot
//! lifecycle and router together, supervises the listener task with
//! exponential backoff, and stops the bot on graceful shutdown.

use crate::bot::Bot;
use crate::config::Config;
use crate::lifecycle::Lifecycle;
use crate::logs::JsonLogFile;
use crate::router::Router;
use crate::store::{ConfigStore, StoreError, YamlFileBackend};
use backon::{ExponentialBackoff, ExponentialBuilder};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::listener::run_listener;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Asynchronously create a daemon directory and any missing parents.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    Ok(())
}

/// Build a jittered exponential backoff with no maximum attempt count.
///
/// The minimum delay is provided by the caller to allow environment-specific
/// tuning.
pub(crate) fn backoff(min_delay: Duration) -> ExponentialBackoff {
    backon::BackoffBuilder::build(
        ExponentialBuilder::default()
            .with_jitter()
            .with_min_delay(min_delay)
            .without_max_times(),
    )
}

/// Sleep for `d` or return early if `shutdown` is triggered.
///
/// Returns `true` if a shutdown occurred.
async fn sleep_or_shutdown(shutdown: &CancellationToken, d: Duration) -> bool {
    tokio::select! {
        () = tokio::time::sleep(d) => false,
        () = shutdown.cancelled() => true,
    }
}

/// Log why a supervised task ended, if it failed.
fn log_task_failure(task: &str, res: &std::result::Result<anyhow::Result<()>, JoinError>) {
    match res {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(task, kind = "inner_error", error = %e, "Task failed"),
        Err(e) => tracing::error!(task, kind = "join_error", error = %e, "Task failed"),
    }
}

/// Supervise a task that returns `Result<()>` and respawn it when it ends.
async fn supervise_task<F, B>(
    name: &str,
    mut handle: JoinHandle<anyhow::Result<()>>,
    mut backoff: ExponentialBackoff,
    mut spawn_fn: F,
    shutdown: CancellationToken,
    mut backoff_builder: B,
) where
    F: FnMut() -> JoinHandle<anyhow::Result<()>>,
    B: FnMut() -> ExponentialBackoff,
{
    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                handle.abort();
                break;
            }
            res = &mut handle => {
                if matches!(res, Ok(Ok(()))) {
                    tracing::warn!(task = name, "Task exited");
                }
                log_task_failure(name, &res);
                let delay = backoff.next().unwrap_or(Duration::ZERO);
                if sleep_or_shutdown(&shutdown, delay).await {
                    break;
                }
                backoff = backoff_builder();
                handle = spawn_fn();
            }
        }
    }
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
///
/// A handler that cannot be installed triggers the shutdown immediately.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGINT handler");
                shutdown.cancel();
                return;
            }
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                shutdown.cancel();
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => tracing::info!("SIGINT received"),
            _ = sigterm.recv() => tracing::info!("SIGTERM received"),
            () = shutdown.cancelled() => return,
        }
        shutdown.cancel();
    });
}

/// Start the daemon with the provided configuration and run until a
/// termination signal arrives.
pub async fn run(config: Config, bot: Arc<dyn Bot>) -> Result<()> {
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());
    run_until(config, bot, shutdown).await
}

/// Start the daemon and run until `shutdown` is cancelled.
///
/// On shutdown the listener is stopped, the bot is given its stop timeout
/// to exit, and the socket file is removed.
pub async fn run_until(config: Config, bot: Arc<dyn Bot>, shutdown: CancellationToken) -> Result<()> {
    ensure_dir(&config.data_dir).await?;
    ensure_dir(&config.log_dir).await?;
    tracing::info!(data = %config.data_dir.display(), "Data directory prepared");

    let store = ConfigStore::open(Arc::new(YamlFileBackend::new(&config.data_dir)))?;
    let lifecycle = Lifecycle::new(bot, shutdown.clone(), &config);
    let logs = Arc::new(JsonLogFile::new(config.log_file()));
    let router = Arc::new(Router::new(store, lifecycle, logs));
    let cfg = Arc::new(config);
    let min_delay = Duration::from_millis(cfg.restart_min_delay_ms);

    let listener = spawn_listener(cfg.clone(), router.clone(), shutdown.clone());
    supervise_task(
        "listener",
        listener,
        backoff(min_delay),
        || spawn_listener(cfg.clone(), router.clone(), shutdown.clone()),
        shutdown.clone(),
        || backoff(min_delay),
    )
    .await;

    router.shutdown().await;
    if let Err(e) = fs::remove_file(&cfg.socket_path).await {
        tracing::debug!(error = %e, "Socket file already gone");
    }
    tracing::info!("Daemon stopped");
    Ok(())
}

fn spawn_listener(
    cfg: Arc<Config>,
    router: Arc<Router>,
    shutdown: CancellationToken,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(run_listener(cfg, router, shutdown))
}

#[cfg(test)]
mod tests;
