//! Cucumber worlds and step definitions.

mod cli_steps;
mod command_steps;
mod daemon_steps;

pub use cli_steps::CliWorld;
pub use command_steps::CommandWorld;
pub use daemon_steps::DaemonWorld;

use async_trait::async_trait;
use dmbotd::bot::{Bot, BotSession, SessionEvent};

/// Becomes ready at once, applies every reload and exits when cancelled.
pub(crate) struct ObedientBot;

#[async_trait]
impl Bot for ObedientBot {
    async fn run(&self, mut session: BotSession) -> anyhow::Result<()> {
        session.mark_running();
        loop {
            match session.next_event().await {
                SessionEvent::Cancelled => return Ok(()),
                SessionEvent::Reload(request) => request.ack(true),
            }
        }
    }
}
