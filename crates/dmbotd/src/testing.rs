//! Scripted bots used by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::bot::{Bot, BotSession, SessionEvent};

/// Marks itself running and answers every reload with `applied`.
pub(crate) struct ScriptedBot {
    pub(crate) applied: bool,
}

impl ScriptedBot {
    pub(crate) const fn obedient() -> Self {
        Self { applied: true }
    }

    pub(crate) const fn rejecting() -> Self {
        Self { applied: false }
    }
}

#[async_trait]
impl Bot for ScriptedBot {
    async fn run(&self, mut session: BotSession) -> anyhow::Result<()> {
        session.mark_running();
        loop {
            match session.next_event().await {
                SessionEvent::Cancelled => return Ok(()),
                SessionEvent::Reload(request) => request.ack(self.applied),
            }
        }
    }
}

/// Never leaves `Initializing`.
pub(crate) struct SlowStartBot;

#[async_trait]
impl Bot for SlowStartBot {
    async fn run(&self, session: BotSession) -> anyhow::Result<()> {
        session.cancelled().await;
        Ok(())
    }
}

/// Running, but never reads reload requests.
pub(crate) struct DeafBot;

#[async_trait]
impl Bot for DeafBot {
    async fn run(&self, session: BotSession) -> anyhow::Result<()> {
        session.mark_running();
        session.cancelled().await;
        Ok(())
    }
}

/// Ignores cancellation.
pub(crate) struct StubbornBot;

#[async_trait]
impl Bot for StubbornBot {
    async fn run(&self, session: BotSession) -> anyhow::Result<()> {
        session.mark_running();
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Fails when asked to stop.
pub(crate) struct FailingBot;

#[async_trait]
impl Bot for FailingBot {
    async fn run(&self, session: BotSession) -> anyhow::Result<()> {
        session.mark_running();
        session.cancelled().await;
        anyhow::bail!("lost the session while stopping")
    }
}

/// Exits as soon as it starts.
pub(crate) struct ShortLivedBot;

#[async_trait]
impl Bot for ShortLivedBot {
    async fn run(&self, _session: BotSession) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Census {
    started: AtomicUsize,
    live: AtomicUsize,
    peak: AtomicUsize,
}

/// Obedient bot recording how many of its runs overlap.
#[derive(Clone, Default)]
pub(crate) struct CensusBot(Arc<Census>);

impl CensusBot {
    pub(crate) fn started(&self) -> usize {
        self.0.started.load(Ordering::SeqCst)
    }

    pub(crate) fn live(&self) -> usize {
        self.0.live.load(Ordering::SeqCst)
    }

    /// Largest number of runs ever alive at the same time.
    pub(crate) fn peak(&self) -> usize {
        self.0.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Bot for CensusBot {
    async fn run(&self, session: BotSession) -> anyhow::Result<()> {
        self.0.started.fetch_add(1, Ordering::SeqCst);
        let live = self.0.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.peak.fetch_max(live, Ordering::SeqCst);
        session.mark_running();
        session.cancelled().await;
        self.0.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
