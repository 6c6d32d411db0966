//! Helper utilities for daemon tests.
//!
//! Provides constructors for temporary daemon configurations rooted in a
//! [`TempDir`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

/// Minimal configuration used in daemon tests.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestConfig {
    /// Path to the Unix Domain Socket.
    pub socket_path: PathBuf,
    /// Directory holding persisted bot settings.
    pub data_dir: PathBuf,
    /// Directory holding the daemon log file.
    pub log_dir: PathBuf,
    /// Bound on the hot-reload rendezvous in milliseconds.
    pub hot_reload_timeout_ms: u64,
    /// Bound on the stop rendezvous in seconds.
    pub stop_timeout_secs: u64,
    /// Minimum delay in milliseconds applied between task restarts.
    pub restart_min_delay_ms: u64,
}

/// Build a [`TestConfig`] using paths inside `tmp`.
///
/// Timeouts are short so tests exercising unanswered rendezvous finish
/// quickly.
pub fn temp_config(tmp: &TempDir) -> TestConfig {
    TestConfig {
        socket_path: tmp.path().join("sock"),
        data_dir: tmp.path().join("data"),
        log_dir: tmp.path().join("logs"),
        hot_reload_timeout_ms: 500,
        stop_timeout_secs: 5,
        restart_min_delay_ms: 1,
    }
}

impl TestConfig {
    /// Override the hot-reload bound and return the updated configuration.
    #[must_use]
    pub fn with_hot_reload_timeout_ms(mut self, ms: u64) -> Self {
        self.hot_reload_timeout_ms = ms;
        self
    }

    /// Override the stop bound and return the updated configuration.
    #[must_use]
    pub fn with_stop_timeout_secs(mut self, secs: u64) -> Self {
        self.stop_timeout_secs = secs;
        self
    }

    /// Override the minimum restart delay (milliseconds) and return the updated
    /// configuration.
    #[must_use]
    pub fn with_restart_min_delay_ms(mut self, ms: u64) -> Self {
        self.restart_min_delay_ms = ms;
        self
    }
}
