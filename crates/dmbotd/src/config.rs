//! Configuration loading for the dmbot daemon.
//!
//! The configuration is stored in `/etc/dmbotd/config.toml`. Values may be
//! overridden by environment variables using the `DMBOTD_` prefix and by
//! command-line flags. Every field has a default, so a missing file yields
//! the built-in configuration.

use clap::Parser;
use figment::Figment;
use figment::providers::Env;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default directory for persisted bot settings.
const DEFAULT_DATA_DIR: &str = "/var/lib/dmbotd";
/// Default directory for the daemon's JSON log file.
const DEFAULT_LOG_DIR: &str = "/var/log/dmbotd";
/// Default bound on the hot-reload rendezvous in milliseconds.
const DEFAULT_HOT_RELOAD_TIMEOUT_MS: u64 = 5_000;
/// Default bound on the stop rendezvous in seconds.
///
/// Generous because the bot may be mid-action when cancelled.
const DEFAULT_STOP_TIMEOUT_SECS: u64 = 60;
/// Default minimum delay between task restarts in milliseconds.
const DEFAULT_RESTART_MIN_DELAY_MS: u64 = 100;

/// File name of the persisted bot settings inside `data_dir`.
pub const SETTINGS_FILE_NAME: &str = "config.yaml";
/// File name of the JSON log inside `log_dir`.
pub const LOG_FILE_NAME: &str = "dmbotd.log";

/// Runtime configuration for the daemon.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct Config {
    /// Path to the Unix Domain Socket.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Directory holding persisted bot settings.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory holding the daemon log file.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Upper bound on waiting for a hot-reload acknowledgement.
    #[serde(default = "default_hot_reload_timeout_ms")]
    pub hot_reload_timeout_ms: u64,
    /// Upper bound on waiting for the bot to acknowledge a stop.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    /// Minimum delay in milliseconds applied between task restarts.
    #[serde(default = "default_restart_min_delay_ms")]
    pub restart_min_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            data_dir: default_data_dir(),
            log_dir: default_log_dir(),
            hot_reload_timeout_ms: DEFAULT_HOT_RELOAD_TIMEOUT_MS,
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS,
            restart_min_delay_ms: DEFAULT_RESTART_MIN_DELAY_MS,
        }
    }
}

/// Convert a [`test_support::daemon::TestConfig`] into a [`Config`].
///
/// ```rust,no_run
/// use dmbotd::config::Config;
/// use test_support::temp_config;
///
/// let tmp = tempfile::tempdir().expect("create tempdir");
/// let cfg: Config = temp_config(&tmp).into();
/// assert_eq!(cfg.stop_timeout_secs, 5);
/// ```
#[cfg(any(test, feature = "test-support"))]
impl From<test_support::daemon::TestConfig> for Config {
    fn from(value: test_support::daemon::TestConfig) -> Self {
        Self {
            socket_path: value.socket_path,
            data_dir: value.data_dir,
            log_dir: value.log_dir,
            hot_reload_timeout_ms: value.hot_reload_timeout_ms,
            stop_timeout_secs: value.stop_timeout_secs,
            restart_min_delay_ms: value.restart_min_delay_ms,
        }
    }
}

/// Convert a borrowed [`test_support::daemon::TestConfig`] into a [`Config`].
#[cfg(any(test, feature = "test-support"))]
impl From<&test_support::daemon::TestConfig> for Config {
    fn from(value: &test_support::daemon::TestConfig) -> Self {
        Self::from(value.clone())
    }
}

/// Command-line overrides for configuration values.
#[derive(Debug, Default, Parser, Serialize)]
#[command(name = "dmbotd", about = "Control daemon for the DM bot")]
struct CliArgs {
    /// Path to the configuration file.
    #[arg(short, long, value_name = "FILE", default_value = Config::DEFAULT_PATH)]
    config: PathBuf,
    /// Override the Unix Domain Socket path.
    #[arg(long)]
    socket_path: Option<PathBuf>,
    /// Override the settings directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Override the log directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(dmbot_lib::DEFAULT_SOCKET_PATH)
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_DIR)
}

fn default_hot_reload_timeout_ms() -> u64 {
    DEFAULT_HOT_RELOAD_TIMEOUT_MS
}

fn default_stop_timeout_secs() -> u64 {
    DEFAULT_STOP_TIMEOUT_SECS
}

fn default_restart_min_delay_ms() -> u64 {
    DEFAULT_RESTART_MIN_DELAY_MS
}

impl Config {
    /// Default location of the daemon configuration file.
    pub const DEFAULT_PATH: &'static str = "/etc/dmbotd/config.toml";

    /// Load the configuration using command-line overrides and environment
    /// variables.
    #[expect(clippy::result_large_err, reason = "propagate figment errors")]
    pub fn load() -> Result<Self, ortho_config::OrthoError> {
        let args = CliArgs::parse();
        Self::from_file_with_cli(&args.config, &args)
    }

    /// Load the configuration from `path`, merging `DMBOTD_*` environment
    /// variables over file values.
    #[expect(clippy::result_large_err, reason = "propagate figment errors")]
    pub fn from_file(path: &Path) -> Result<Self, ortho_config::OrthoError> {
        Self::from_file_with_cli(path, &CliArgs::default())
    }

    #[expect(clippy::result_large_err, reason = "propagate figment errors")]
    fn from_file_with_cli(path: &Path, cli: &CliArgs) -> Result<Self, ortho_config::OrthoError> {
        let fig = ortho_config::load_config_file(path)?.unwrap_or_else(Figment::new);
        let fig = fig.merge(Env::prefixed("DMBOTD_").split("__"));
        let mut cfg: Self = fig.extract().map_err(ortho_config::OrthoError::from)?;

        if let Some(socket) = &cli.socket_path {
            cfg.socket_path.clone_from(socket);
        }
        if let Some(dir) = &cli.data_dir {
            cfg.data_dir.clone_from(dir);
        }
        if let Some(dir) = &cli.log_dir {
            cfg.log_dir.clone_from(dir);
        }
        Ok(cfg)
    }

    /// Path of the persisted bot settings.
    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE_NAME)
    }

    /// Path of the JSON log file served by `getLogs`.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    /// Bound on the hot-reload rendezvous.
    #[must_use]
    pub fn hot_reload_timeout(&self) -> Duration {
        Duration::from_millis(self.hot_reload_timeout_ms)
    }

    /// Bound on the stop rendezvous.
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}
