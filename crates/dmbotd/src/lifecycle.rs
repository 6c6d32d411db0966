//! Worker lifecycle management.
//!
//! [`Lifecycle`] owns at most one bot lifetime at a time. A lifetime bundles
//! the cancellation token, the stop acknowledgement, the hot-reload request
//! channel and the observable [`WorkerState`]; all of them are created on
//! start and dropped when the manager returns to idle, so nothing leaks from
//! one run into the next.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bot::{Bot, BotSession, ReloadRequest};
use crate::config::Config;
use crate::settings::BotConfig;

/// Observable state of the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    Idle,
    Initializing,
    Running,
    Stopping,
}

/// Why a lifecycle operation did not succeed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("bot is already running")]
    AlreadyRunning,
    #[error("bot is not running")]
    NotStarted,
    #[error("bot is still initializing")]
    Initializing,
    #[error("bot is stopping")]
    Stopping,
    /// No stop acknowledgement arrived within the stop timeout.
    #[error("bot did not acknowledge the stop request in time")]
    StopUnacknowledged,
    /// The bot exited with an error or panicked.
    #[error("bot exited with an error")]
    WorkerFailed,
    /// No hot-reload acknowledgement arrived within the reload timeout.
    #[error("bot did not acknowledge the hot reload in time")]
    ReloadUnacknowledged,
    /// The bot answered the hot reload negatively.
    #[error("bot rejected the new configuration")]
    ReloadRejected,
    #[error("daemon is shutting down")]
    ShuttingDown,
}

/// Everything that exists only while a bot runs.
struct Lifetime {
    token: CancellationToken,
    state: Arc<watch::Sender<WorkerState>>,
    stopped: oneshot::Receiver<bool>,
    reloads: mpsc::Sender<ReloadRequest>,
    handle: JoinHandle<()>,
}

impl Lifetime {
    fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    fn cancel(&self) {
        self.state.send_replace(WorkerState::Stopping);
        self.token.cancel();
    }

    /// Drop the lifetime, aborting the task if it did not stop cleanly.
    fn release(self, abort: bool) {
        if abort {
            self.handle.abort();
        }
        self.state.send_replace(WorkerState::Idle);
    }
}

/// Starts, stops and hot-reloads the bot.
pub struct Lifecycle {
    bot: Arc<dyn Bot>,
    shutdown: CancellationToken,
    stop_timeout: Duration,
    hot_reload_timeout: Duration,
    lifetime: Option<Lifetime>,
}

impl Lifecycle {
    /// Create an idle manager for `bot`.
    ///
    /// Every lifetime's token is a child of `shutdown`, and every wait is
    /// interrupted when `shutdown` is cancelled.
    pub fn new(bot: Arc<dyn Bot>, shutdown: CancellationToken, config: &Config) -> Self {
        Self {
            bot,
            shutdown,
            stop_timeout: config.stop_timeout(),
            hot_reload_timeout: config.hot_reload_timeout(),
            lifetime: None,
        }
    }

    /// Current state, after reaping a bot that exited on its own.
    pub fn state(&mut self) -> WorkerState {
        self.reap();
        self.lifetime.as_ref().map_or(WorkerState::Idle, Lifetime::state)
    }

    /// Watch the live lifetime's state, if any.
    #[must_use]
    pub fn subscribe(&self) -> Option<watch::Receiver<WorkerState>> {
        self.lifetime.as_ref().map(|l| l.state.subscribe())
    }

    /// Spawn the bot with `config`.
    ///
    /// The caller checks readiness first. The bot starts in
    /// [`WorkerState::Initializing`].
    ///
    /// # Errors
    ///
    /// [`LifecycleError::AlreadyRunning`] if a lifetime exists and
    /// [`LifecycleError::ShuttingDown`] once shutdown began. Nothing changes
    /// in either case.
    pub fn start(&mut self, config: Arc<BotConfig>) -> Result<(), LifecycleError> {
        self.reap();
        if self.lifetime.is_some() {
            return Err(LifecycleError::AlreadyRunning);
        }
        if self.shutdown.is_cancelled() {
            return Err(LifecycleError::ShuttingDown);
        }

        let token = self.shutdown.child_token();
        let (state, _) = watch::channel(WorkerState::Initializing);
        let state = Arc::new(state);
        let (stopped_tx, stopped) = oneshot::channel();
        let (reloads, reload_rx) = mpsc::channel(1);
        let session = BotSession::new(config, token.clone(), Arc::clone(&state), reload_rx);

        let bot = Arc::clone(&self.bot);
        let task_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            let result = bot.run(session).await;
            task_state.send_replace(WorkerState::Stopping);
            let clean = match result {
                Ok(()) => {
                    tracing::info!("Bot exited");
                    true
                }
                Err(e) => {
                    tracing::error!(error = %e, "Bot exited with an error");
                    false
                }
            };
            // The receiver is gone if the daemon stopped waiting.
            let _ = stopped_tx.send(clean);
        });

        self.lifetime = Some(Lifetime {
            token,
            state,
            stopped,
            reloads,
            handle,
        });
        tracing::info!("Bot started");
        Ok(())
    }

    /// Cancel the bot and wait for its stop acknowledgement.
    ///
    /// The lifetime is released whatever the outcome; a bot that fails to
    /// acknowledge in time is aborted.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotStarted`] without a lifetime. Otherwise
    /// [`LifecycleError::WorkerFailed`], [`LifecycleError::StopUnacknowledged`]
    /// or [`LifecycleError::ShuttingDown`] when the stop was not clean.
    pub async fn stop(&mut self) -> Result<(), LifecycleError> {
        self.reap();
        let Some(mut lifetime) = self.lifetime.take() else {
            return Err(LifecycleError::NotStarted);
        };
        lifetime.cancel();
        let outcome = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(LifecycleError::ShuttingDown),
            res = tokio::time::timeout(self.stop_timeout, &mut lifetime.stopped) => match res {
                Ok(Ok(true)) => Ok(()),
                Ok(Ok(false) | Err(_)) => Err(LifecycleError::WorkerFailed),
                Err(_) => Err(LifecycleError::StopUnacknowledged),
            },
        };
        if let Err(e) = outcome {
            tracing::warn!(error = %e, "Bot did not stop cleanly");
        }
        lifetime.release(outcome.is_err());
        outcome
    }

    /// Push `config` to the running bot and wait for its answer.
    ///
    /// # Errors
    ///
    /// Guard errors ([`LifecycleError::NotStarted`],
    /// [`LifecycleError::Initializing`], [`LifecycleError::Stopping`]) leave
    /// the bot untouched. [`LifecycleError::ReloadRejected`] carries a
    /// negative answer; [`LifecycleError::ReloadUnacknowledged`] and
    /// [`LifecycleError::ShuttingDown`] mean no answer came.
    pub async fn hot_reload(&mut self, config: Arc<BotConfig>) -> Result<(), LifecycleError> {
        self.reap();
        let Some(lifetime) = self.lifetime.as_ref() else {
            return Err(LifecycleError::NotStarted);
        };
        match lifetime.state() {
            WorkerState::Running => {}
            WorkerState::Initializing => return Err(LifecycleError::Initializing),
            WorkerState::Stopping => return Err(LifecycleError::Stopping),
            WorkerState::Idle => return Err(LifecycleError::NotStarted),
        }

        let (ack, answer) = oneshot::channel();
        let exchange = async {
            lifetime
                .reloads
                .send(ReloadRequest::new(config, ack))
                .await
                .map_err(|_| LifecycleError::ReloadUnacknowledged)?;
            answer.await.map_err(|_| LifecycleError::ReloadUnacknowledged)
        };
        let applied = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(LifecycleError::ShuttingDown),
            res = tokio::time::timeout(self.hot_reload_timeout, exchange) => {
                res.unwrap_or(Err(LifecycleError::ReloadUnacknowledged))
            }
        }?;
        if applied {
            tracing::info!("Bot hot reloaded");
            Ok(())
        } else {
            Err(LifecycleError::ReloadRejected)
        }
    }

    /// Stop the live bot, if any, during daemon shutdown.
    ///
    /// Waits at most the stop timeout, then aborts the task.
    pub async fn shutdown(&mut self) {
        let Some(mut lifetime) = self.lifetime.take() else {
            return;
        };
        lifetime.cancel();
        let clean = matches!(
            tokio::time::timeout(self.stop_timeout, &mut lifetime.stopped).await,
            Ok(Ok(true))
        );
        if clean {
            tracing::info!("Bot stopped for shutdown");
        } else {
            tracing::warn!("Bot did not stop cleanly during shutdown");
        }
        lifetime.release(!clean);
    }

    /// Release a lifetime whose bot already exited.
    fn reap(&mut self) {
        let Some(lifetime) = self.lifetime.as_mut() else {
            return;
        };
        let clean = match lifetime.stopped.try_recv() {
            Ok(clean) => clean,
            Err(TryRecvError::Closed) => false,
            Err(TryRecvError::Empty) => return,
        };
        tracing::info!(clean, "Reaping bot that exited on its own");
        if let Some(lifetime) = self.lifetime.take() {
            lifetime.release(!clean);
        }
    }
}
