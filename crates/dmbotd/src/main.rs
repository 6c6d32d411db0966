//! Entry point for the dmbot daemon binary.
//!
//! Loads the configuration, initializes logging and serves commands until
//! SIGINT or SIGTERM.

use std::sync::Arc;

use dmbotd::bot::DryRunBot;
use dmbotd::config::Config;
use dmbotd::{logging, supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    logging::init(&config.log_file())?;
    tracing::info!(socket = %config.socket_path.display(), "dmbotd starting");
    supervisor::run(config, Arc::new(DryRunBot)).await?;
    Ok(())
}
