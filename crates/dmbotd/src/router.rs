//! Command router.
//!
//! Every command enters the daemon through [`Router::dispatch`] and leaves
//! as exactly one [`Response`]. Commands are processed one at a time: the
//! router lock is held from the store reload to the reply, including the
//! stop and hot-reload rendezvous.

use std::sync::Arc;

use dmbot_lib::{CommandEnvelope, CommandKind, Response};
use serde_json::json;
use serde_json::value::RawValue;
use tokio::sync::{Mutex, watch};

use crate::lifecycle::{Lifecycle, LifecycleError, WorkerState};
use crate::logs::LogSource;
use crate::settings::{
    AccountSettings, BlacklistSettings, DmSettings, QuotaSettings, ScheduleSettings,
    SourceSettings,
};
use crate::store::ConfigStore;
use crate::validation::{Form, parse_form};

const RESET_OK: &str = "Global configuration was successfully reset!";
const CLEAR_OK: &str = "Data successfully cleared!";
const LAUNCH_OK: &str = "Dm bot successfully launched!";
const ALREADY_RUNNING: &str = "Bot is already running!";
const STOP_OK: &str = "Dm bot successfully stopped!";
const STOP_NOT_STARTED: &str =
    "Bot isn't running, nothing to stop. If it was just launched, retry shortly.";
const STOP_FAILED: &str = "Error during bot stopping! Please restart";
const RELOAD_OK: &str = "Bot hot reload successfully!";
const RELOAD_FAILED: &str = "Error during bot hot reload! Please restart the bot";
const RELOAD_NOT_STARTED: &str = "Bot isn't running yet.";
const RELOAD_INITIALIZING: &str =
    "Bot is in the initialization phase, please wait before trying to hot reload it.";
const RELOAD_STOPPING: &str = "Bot is stopping, please wait before trying to hot reload it.";
const UNEXPECTED: &str = "Unexpected message received.";
const RECEPTION_FAILED: &str = "Error during message reception";

/// State guarded by the router lock.
struct Inner {
    store: ConfigStore,
    lifecycle: Lifecycle,
    logs: Arc<dyn LogSource>,
}

/// Routes command envelopes to their handlers.
pub struct Router {
    inner: Mutex<Inner>,
}

impl Router {
    pub fn new(store: ConfigStore, lifecycle: Lifecycle, logs: Arc<dyn LogSource>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store,
                lifecycle,
                logs,
            }),
        }
    }

    /// Handle one command. Never fails: every problem becomes an error
    /// response.
    pub async fn dispatch(&self, envelope: CommandEnvelope) -> Response {
        let kind = match envelope.kind.parse::<CommandKind>() {
            Ok(kind) => kind,
            Err(e) => {
                tracing::error!(error = %e, "Unexpected message received");
                return Response::error(UNEXPECTED);
            }
        };
        let mut inner = self.inner.lock().await;
        if let Err(e) = inner.store.reload().await {
            tracing::error!(%kind, error = %e, "Failed to load the configuration");
            return Response::error(format!("Failed to load the configuration! Error: {e}"));
        }
        let payload = envelope.payload.as_deref();
        let response = match kind {
            CommandKind::ResetGlobalDefaultSettings => inner.reset().await,
            CommandKind::ClearAllData => inner.clear().await,
            CommandKind::IgCredentialsForm => inner.update::<AccountSettings>(payload).await,
            CommandKind::QuotasForm => inner.update::<QuotaSettings>(payload).await,
            CommandKind::SchedulerForm => inner.update::<ScheduleSettings>(payload).await,
            CommandKind::BlacklistForm => inner.update::<BlacklistSettings>(payload).await,
            CommandKind::DmSettingsForm => inner.update::<DmSettings>(payload).await,
            CommandKind::DmUserScrappingSettingsForm => inner.update::<SourceSettings>(payload).await,
            CommandKind::LaunchDmBot => inner.launch(),
            CommandKind::StopDmBot => inner.stop().await,
            CommandKind::HotReloadBot => inner.hot_reload().await,
            CommandKind::GetLogs => inner.logs().await,
        };
        tracing::info!(%kind, status = ?response.status, "Command handled");
        response
    }

    /// Decode an envelope from `bytes` and dispatch it.
    pub async fn dispatch_bytes(&self, bytes: &[u8]) -> Response {
        match serde_json::from_slice::<CommandEnvelope>(bytes) {
            Ok(envelope) => self.dispatch(envelope).await,
            Err(e) => {
                tracing::error!(error = %e, "Failed to decode command envelope");
                Response::error(RECEPTION_FAILED)
            }
        }
    }

    /// Current bot state.
    pub async fn worker_state(&self) -> WorkerState {
        self.inner.lock().await.lifecycle.state()
    }

    /// Watch the state of the live bot, if one runs.
    pub async fn watch_worker(&self) -> Option<watch::Receiver<WorkerState>> {
        self.inner.lock().await.lifecycle.subscribe()
    }

    /// Stop the bot as part of daemon shutdown.
    pub async fn shutdown(&self) {
        self.inner.lock().await.lifecycle.shutdown().await;
    }
}

impl Inner {
    async fn reset(&mut self) -> Response {
        match self.store.reset().await {
            Ok(()) => Response::success(RESET_OK),
            Err(e) => {
                tracing::error!(error = %e, "Configuration reset failed");
                Response::error(format!("Global configuration reset failed! Error: {e}"))
            }
        }
    }

    async fn clear(&mut self) -> Response {
        match self.store.clear_persisted_data().await {
            Ok(()) => Response::success(CLEAR_OK),
            Err(e) => {
                tracing::error!(error = %e, "Data clearing failed");
                Response::error(format!("Data clearing failed! Error: {e}"))
            }
        }
    }

    async fn update<T: Form>(&mut self, payload: Option<&RawValue>) -> Response {
        let form = match parse_form::<T>(payload) {
            Ok(form) => form,
            Err(e) => {
                tracing::warn!(form = T::FORM, error = ?e, "Form rejected");
                return Response::error(e.to_string());
            }
        };
        let section = form.into_section();
        let name = section.name();
        match self.store.replace_section(section).await {
            Ok(()) => {
                tracing::info!(form = T::FORM, section = name, "Section replaced");
                Response::success(format!("{} settings successfully updated!", T::LABEL))
            }
            Err(e) => {
                tracing::error!(form = T::FORM, section = name, error = %e, "Failed to persist form");
                Response::error(format!("{} settings update failed! Error: {e}", T::LABEL))
            }
        }
    }

    fn launch(&mut self) -> Response {
        if let Err(reason) = self.store.readiness() {
            tracing::warn!(%reason, "Bot launch refused");
            return Response::error(format!("Bot can't be launched: {reason}."));
        }
        let response = match self.lifecycle.start(self.store.snapshot()) {
            Ok(()) => Response::success(LAUNCH_OK),
            Err(LifecycleError::AlreadyRunning) => Response::error(ALREADY_RUNNING),
            Err(e) => Response::error(format!("Bot launch failed! Error: {e}")),
        };
        self.with_state(response)
    }

    async fn stop(&mut self) -> Response {
        let response = match self.lifecycle.stop().await {
            Ok(()) => Response::success(STOP_OK),
            Err(LifecycleError::NotStarted) => Response::error(STOP_NOT_STARTED),
            Err(_) => Response::error(STOP_FAILED),
        };
        self.with_state(response)
    }

    async fn hot_reload(&mut self) -> Response {
        let response = match self.lifecycle.hot_reload(self.store.snapshot()).await {
            Ok(()) => Response::success(RELOAD_OK),
            Err(LifecycleError::NotStarted) => Response::error(RELOAD_NOT_STARTED),
            Err(LifecycleError::Initializing) => Response::error(RELOAD_INITIALIZING),
            Err(LifecycleError::Stopping) => Response::error(RELOAD_STOPPING),
            Err(LifecycleError::ReloadRejected) => Response::error(RELOAD_FAILED),
            Err(e) => {
                tracing::error!(error = %e, "Hot reload was not acknowledged");
                Response::error(format!("{RELOAD_FAILED} (Error: {e})"))
            }
        };
        self.with_state(response)
    }

    async fn logs(&self) -> Response {
        let logs = Arc::clone(&self.logs);
        match tokio::task::spawn_blocking(move || logs.read_logs()).await {
            Ok(Ok(text)) => Response::success(text),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Can't parse logs");
                Response::error(format!("Can't parse logs: {e}"))
            }
            Err(e) => {
                tracing::error!(error = %e, "Log reader task failed");
                Response::error(format!("Can't parse logs: {e}"))
            }
        }
    }

    /// Attach the bot state to a lifecycle response.
    fn with_state(&mut self, response: Response) -> Response {
        response.with_payload(json!({ "state": self.lifecycle.state() }))
    }
}
