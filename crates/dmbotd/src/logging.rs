//! Logging utilities for the daemon.
//!
//! Initializes structured logging using `tracing` and
//! `tracing-subscriber`, reading filter settings from the `RUST_LOG`
//! environment variable. Besides human-readable output on stdout, records
//! are appended as JSON lines to the daemon log file, which `getLogs` reads
//! back through [`crate::logs::JsonLogFile`].

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Filter applied when `RUST_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// JSON layer writing one record per line to `writer`.
pub fn json_layer<S, W>(writer: W) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fmt::layer().json().with_writer(writer)
}

/// Initialize the global tracing subscriber.
///
/// Logs go to stdout and, as JSON, to `log_file`, whose parent directory is
/// created if needed. Call `init` before any logging statements to avoid
/// missing logs.
///
/// # Errors
///
/// Fails if the log file cannot be opened or a global subscriber is already
/// installed.
///
/// # Examples
///
/// ```rust,no_run
/// use dmbotd::logging::init;
/// use std::path::Path;
///
/// init(Path::new("/var/log/dmbotd/dmbotd.log")).expect("logging");
/// tracing::info!("Logging is initialized!");
/// ```
pub fn init(log_file: &Path) -> Result<()> {
    if let Some(dir) = log_file.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer())
        .with(json_layer(Mutex::new(file)))
        .try_init()?;
    Ok(())
}

/// Initialize logging with a custom writer.
///
/// # Examples
///
/// ```rust,no_run
/// use dmbotd::logging::init_with_writer;
/// use tracing_subscriber::fmt;
///
/// init_with_writer(fmt::writer::BoxMakeWriter::new(std::io::stdout));
/// ```
pub fn init_with_writer<W>(writer: W)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fmt().with_env_filter(env_filter()).with_writer(writer).init();
}
