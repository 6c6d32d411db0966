//! The background DM bot and the session it runs in.
//!
//! A [`Bot`] is started by the [`crate::lifecycle::Lifecycle`] with a fresh
//! [`BotSession`]. The session is the bot's only link to the daemon: it
//! carries the configuration snapshot, the cancellation token, the state
//! the bot reports back, and incoming hot-reload requests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveTime};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::lifecycle::WorkerState;
use crate::settings::{BotConfig, DmSettings, QuotaSettings, ScheduleSettings};

/// Worker automation logic.
///
/// `run` should call [`BotSession::mark_running`] once set up, then keep
/// working until [`BotSession::next_event`] yields
/// [`SessionEvent::Cancelled`]. Returning `Ok` acknowledges the stop;
/// returning an error reports a failed stop.
#[async_trait]
pub trait Bot: Send + Sync + 'static {
    async fn run(&self, session: BotSession) -> anyhow::Result<()>;
}

/// A new configuration pushed to a running bot.
///
/// The bot must answer exactly once through [`ReloadRequest::ack`].
#[derive(Debug)]
pub struct ReloadRequest {
    config: Arc<BotConfig>,
    ack: oneshot::Sender<bool>,
}

impl ReloadRequest {
    pub(crate) fn new(config: Arc<BotConfig>, ack: oneshot::Sender<bool>) -> Self {
        Self { config, ack }
    }

    /// Configuration to apply.
    #[must_use]
    pub fn config(&self) -> &Arc<BotConfig> {
        &self.config
    }

    /// Report whether the new configuration was applied.
    pub fn ack(self, applied: bool) {
        if self.ack.send(applied).is_err() {
            tracing::warn!(applied, "Hot reload acknowledged after the daemon gave up waiting");
        }
    }
}

/// What woke the bot up.
#[derive(Debug)]
pub enum SessionEvent {
    /// The daemon asked the bot to stop.
    Cancelled,
    /// The daemon pushed a new configuration.
    Reload(ReloadRequest),
}

/// Per-lifetime handle given to [`Bot::run`].
#[derive(Debug)]
pub struct BotSession {
    config: Arc<BotConfig>,
    token: CancellationToken,
    state: Arc<watch::Sender<WorkerState>>,
    reloads: mpsc::Receiver<ReloadRequest>,
}

impl BotSession {
    pub(crate) fn new(
        config: Arc<BotConfig>,
        token: CancellationToken,
        state: Arc<watch::Sender<WorkerState>>,
        reloads: mpsc::Receiver<ReloadRequest>,
    ) -> Self {
        Self {
            config,
            token,
            state,
            reloads,
        }
    }

    /// Configuration snapshot the bot was started with.
    #[must_use]
    pub fn config(&self) -> &Arc<BotConfig> {
        &self.config
    }

    /// Signal that setup finished and hot reloads may be delivered.
    ///
    /// Only moves `Initializing` to `Running`; returns `false` if a stop
    /// already began.
    pub fn mark_running(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == WorkerState::Initializing {
                *state = WorkerState::Running;
                true
            } else {
                false
            }
        })
    }

    /// `true` once the daemon asked the bot to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve when the daemon asks the bot to stop.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Wait for the next stop or reload signal. Stop wins a tie.
    pub async fn next_event(&mut self) -> SessionEvent {
        tokio::select! {
            biased;
            () = self.token.cancelled() => SessionEvent::Cancelled,
            request = self.reloads.recv() => match request {
                Some(request) => SessionEvent::Reload(request),
                None => {
                    self.token.cancelled().await;
                    SessionEvent::Cancelled
                }
            },
        }
    }
}

/// Bot that walks through its targets and logs the DMs it would send.
///
/// It honours quotas, schedule and blacklist but never contacts the
/// third-party service.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunBot;

#[async_trait]
impl Bot for DryRunBot {
    async fn run(&self, mut session: BotSession) -> anyhow::Result<()> {
        let mut run = DryRun::new(Arc::clone(session.config()));
        session.mark_running();
        tracing::info!(
            user = %run.config.account.username,
            sources = run.config.src_users.src_accounts.len(),
            "Dm bot running in dry-run mode"
        );
        loop {
            let pause = pause_between_dms(&run.config.quotas);
            tokio::select! {
                event = session.next_event() => match event {
                    SessionEvent::Cancelled => break,
                    SessionEvent::Reload(request) => {
                        let applied = run.reload(request.config());
                        request.ack(applied);
                    }
                },
                () = tokio::time::sleep(pause) => {
                    let now = Local::now().naive_local();
                    run.step(now.date(), now.time());
                }
            }
        }
        tracing::info!(sent = run.sent_total, "Dm bot stopped");
        Ok(())
    }
}

/// Progress of a dry run.
struct DryRun {
    config: Arc<BotConfig>,
    day: Option<NaiveDate>,
    sent_today: u32,
    sent_total: u64,
    cursor: usize,
    contacted: HashSet<String>,
}

impl DryRun {
    fn new(config: Arc<BotConfig>) -> Self {
        Self {
            config,
            day: None,
            sent_today: 0,
            sent_total: 0,
            cursor: 0,
            contacted: HashSet::new(),
        }
    }

    /// Swap in `config` if it could launch the bot; otherwise keep the
    /// current one.
    fn reload(&mut self, config: &Arc<BotConfig>) -> bool {
        if let Err(reason) = config.readiness() {
            tracing::warn!(%reason, "Hot reload refused, keeping the current configuration");
            return false;
        }
        self.config = Arc::clone(config);
        tracing::info!("Dm bot configuration reloaded");
        true
    }

    /// Attempt one DM. Returns the recipient if one would have been sent.
    fn step(&mut self, today: NaiveDate, now: NaiveTime) -> Option<String> {
        if self.day != Some(today) {
            self.day = Some(today);
            self.sent_today = 0;
        }
        if !in_schedule(&self.config.schedule, now) {
            tracing::debug!("Outside scheduled hours");
            return None;
        }
        if self.config.quotas.activated && self.sent_today >= self.config.quotas.dm_day {
            tracing::debug!(sent = self.sent_today, "Daily quota reached");
            return None;
        }
        let user = self.next_target()?;
        let message = render_message(&self.config.auto_dm, &user, self.cursor);
        tracing::info!(%user, %message, "Would send DM");
        self.sent_today += 1;
        self.sent_total += 1;
        if self.config.blacklist.blacklist_interacted {
            self.contacted.insert(user.clone());
        }
        Some(user)
    }

    /// Next follower of the source accounts that is not blacklisted.
    fn next_target(&mut self) -> Option<String> {
        let sources = &self.config.src_users;
        let per_source = usize::try_from(sources.fetch_quantity).unwrap_or(usize::MAX);
        let total = sources.src_accounts.len().saturating_mul(per_source);
        while self.cursor < total {
            let n = self.cursor;
            self.cursor += 1;
            let source = &sources.src_accounts[n % sources.src_accounts.len()];
            let user = format!("{source}.follower{}", n / sources.src_accounts.len());
            if !self.is_blacklisted(&user) {
                return Some(user);
            }
        }
        tracing::debug!("No target left");
        None
    }

    fn is_blacklisted(&self, user: &str) -> bool {
        let list = &self.config.blacklist;
        (list.activated && list.users.iter().any(|u| u == user)) || self.contacted.contains(user)
    }
}

/// Delay between two DMs so the hourly quota is spread over the hour.
fn pause_between_dms(quotas: &QuotaSettings) -> Duration {
    if quotas.activated && quotas.dm_hour > 0 {
        Duration::from_secs(3600 / u64::from(quotas.dm_hour))
    } else {
        Duration::from_secs(60)
    }
}

fn in_schedule(schedule: &ScheduleSettings, now: NaiveTime) -> bool {
    !schedule.activated || schedule.windows.iter().any(|w| w.contains(now))
}

/// Pick a template by rotation and prepend the greeting, if any.
fn render_message(dm: &DmSettings, user: &str, n: usize) -> String {
    let template = dm
        .dm_templates
        .get(n % dm.dm_templates.len().max(1))
        .map_or("", String::as_str);
    if dm.greeting.activated {
        format!("{} {user}, {template}", dm.greeting.template)
    } else {
        template.to_owned()
    }
}
